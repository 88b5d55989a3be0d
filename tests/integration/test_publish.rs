//! Integration tests for `release-rail publish`

#![cfg(unix)]

use crate::helpers::{
  ReleaseRemote, fake_packager, git_stdout, packager_calls, run_release_rail, run_release_rail_unchecked,
  stdout_lines,
};
use anyhow::Result;
use std::path::PathBuf;

/// Version file and tarball the pipeline would hand over
fn write_inputs(remote: &ReleaseRemote, version: &str) -> Result<()> {
  let inputs = remote.work.join("inputs");
  std::fs::create_dir_all(&inputs)?;
  std::fs::write(inputs.join("version"), format!("{}\n", version))?;
  std::fs::write(inputs.join(format!("app-{}.tgz", version)), "candidate")?;
  Ok(())
}

/// The working copy release-rail cached under `work/cache`
fn cached_working_copy(remote: &ReleaseRemote) -> Result<PathBuf> {
  let entry = std::fs::read_dir(remote.work.join("cache"))?
    .filter_map(Result::ok)
    .find(|e| e.file_name().to_string_lossy().starts_with("release-"))
    .ok_or_else(|| anyhow::anyhow!("no cached working copy"))?;
  Ok(entry.path())
}

#[test]
fn test_publish_finalizes_commits_and_tags() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  let source = remote.commit_file("src/app.txt", "feature", "Add feature")?;
  let packager = fake_packager(&remote.work)?;
  remote.write_config("", &format!("tool = \"{}\"", packager.display()))?;
  write_inputs(&remote, "1.4.0")?;

  let output = run_release_rail(
    &remote.work,
    &["publish", "--version-file", "inputs/version", "--tarball", "inputs/*.tgz"],
  )?;

  let head = remote.rev_parse("main")?;
  assert_ne!(head, source);
  assert_eq!(git_stdout(&remote.remote, &["log", "-1", "--format=%s", "main"])?, "Version 1.4.0");
  assert_eq!(git_stdout(&remote.remote, &["log", "-1", "--format=%an <%ae>", "main"])?, "CI Bot <ci@localhost>");
  assert_eq!(remote.rev_parse("v1.4.0^{commit}")?, source);

  let lines = stdout_lines(&output);
  assert_eq!(lines[0], "app 1.4.0");
  assert_eq!(lines[1], format!("commit {}", head));
  assert_eq!(lines[2], format!("tag v1.4.0 -> {}", source));

  let calls = packager_calls(&packager)?;
  assert_eq!(
    calls[0],
    format!(
      "finalize-release --name app --version 1.4.0 {}",
      remote.work.join("inputs/app-1.4.0.tgz").display()
    )
  );

  let output = run_release_rail(&remote.work, &["check"])?;
  assert_eq!(stdout_lines(&output), vec!["1.4.0"]);
  Ok(())
}

#[test]
fn test_publish_commit_message_and_skip_tag() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  let packager = fake_packager(&remote.work)?;
  remote.write_config("", &format!("tool = \"{}\"\nskip_tag = true", packager.display()))?;
  write_inputs(&remote, "2.0.0")?;
  std::fs::write(remote.work.join("inputs/message"), "Release app 2.0.0 [ci skip]\n")?;

  let output = run_release_rail(
    &remote.work,
    &[
      "publish",
      "--source-dir",
      "inputs",
      "--version-file",
      "version",
      "--tarball",
      "app-*.tgz",
      "--commit-file",
      "message",
      "--json",
    ],
  )?;

  let published: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(published["version"], "2.0.0");
  assert_eq!(published["tag"], serde_json::Value::Null);
  assert_eq!(published["tool_version"], "7.1.0-fake");
  assert_eq!(
    git_stdout(&remote.remote, &["log", "-1", "--format=%s", "main"])?,
    "Release app 2.0.0 [ci skip]"
  );
  assert!(remote.rev_parse("v2.0.0").is_err());
  Ok(())
}

#[test]
fn test_publish_from_repository() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  let packager = fake_packager(&remote.work)?;
  remote.write_config("", &format!("tool = \"{}\"", packager.display()))?;
  write_inputs(&remote, "3.0.0")?;
  let built = remote.work.join("release-src");
  std::fs::create_dir_all(&built)?;

  run_release_rail(
    &remote.work,
    &["publish", "--version-file", "inputs/version", "--from-repository", "release-src"],
  )?;

  let calls = packager_calls(&packager)?;
  let tarball = built.join("release.tgz");
  assert_eq!(calls[0], format!("create-release --force --tarball {}", tarball.display()));
  assert!(calls[1].starts_with("finalize-release --name app --version 3.0.0"));
  assert!(tarball.exists());
  assert!(remote.rev_parse("v3.0.0").is_ok());
  Ok(())
}

#[test]
fn test_publish_keeps_private_config_out_of_history() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  let packager = fake_packager(&remote.work)?;
  remote.write_config(
    "[source.private_config.blobstore.options]\naccess_key_id = \"id\"",
    &format!("tool = \"{}\"", packager.display()),
  )?;
  write_inputs(&remote, "1.0.0")?;

  run_release_rail(
    &remote.work,
    &["publish", "--version-file", "inputs/version", "--tarball", "inputs/*.tgz"],
  )?;

  let working_copy = cached_working_copy(&remote)?;
  let private = std::fs::read_to_string(working_copy.join("config/private.yml"))?;
  assert!(private.contains("access_key_id: id"));
  let tracked = git_stdout(&remote.remote, &["ls-tree", "-r", "--name-only", "main"])?;
  assert!(!tracked.contains("private.yml"));
  assert!(tracked.contains("releases/app/index.yml"));
  Ok(())
}

#[test]
fn test_publish_requires_branch() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  write_inputs(&remote, "1.0.0")?;
  std::fs::write(
    remote.work.join("release-rail.toml"),
    format!("[source]\nrepository = \"{}\"\n", remote.url()),
  )?;

  let output = run_release_rail_unchecked(
    &remote.work,
    &["publish", "--version-file", "inputs/version", "--tarball", "inputs/*.tgz"],
  )?;

  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("source.branch"));
  Ok(())
}

#[test]
fn test_publish_ambiguous_tarball_changes_nothing() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  let before = remote.rev_parse("main")?;
  let packager = fake_packager(&remote.work)?;
  remote.write_config("", &format!("tool = \"{}\"", packager.display()))?;
  write_inputs(&remote, "1.0.0")?;
  std::fs::write(remote.work.join("inputs/other.tgz"), "")?;

  let output = run_release_rail_unchecked(
    &remote.work,
    &["publish", "--version-file", "inputs/version", "--tarball", "inputs/*.tgz"],
  )?;

  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("multiple files matched"));
  assert_eq!(remote.rev_parse("main")?, before);
  assert!(packager_calls(&packager)?.is_empty());
  Ok(())
}

#[test]
fn test_publish_tool_failure_is_system_error() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  let before = remote.rev_parse("main")?;
  remote.write_config("", "tool = \"/nonexistent/release-packager\"")?;
  write_inputs(&remote, "1.0.0")?;

  let output = run_release_rail_unchecked(
    &remote.work,
    &["publish", "--version-file", "inputs/version", "--tarball", "inputs/*.tgz"],
  )?;

  assert_eq!(output.status.code(), Some(2));
  assert!(String::from_utf8_lossy(&output.stderr).contains("finalizing release"));
  assert_eq!(remote.rev_parse("main")?, before);
  Ok(())
}
