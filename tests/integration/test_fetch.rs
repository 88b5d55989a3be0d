//! Integration tests for `release-rail fetch`

#![cfg(unix)]

use crate::helpers::{ReleaseRemote, fake_packager, packager_calls, run_release_rail, stdout_lines};
use anyhow::Result;

#[test]
fn test_fetch_final_version_from_manifest() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  remote.commit_file("releases/app/index.yml", "builds:\n  a: {version: 1.0.0}\n", "1.0.0")?;
  let packager = fake_packager(&remote.work)?;
  remote.write_config("", &format!("tool = \"{}\"", packager.display()))?;

  let output = run_release_rail(&remote.work, &["fetch", "1.0.0", "--destination", "out"])?;

  let tarball = remote.work.join("out/app-1.0.0.tgz");
  assert!(tarball.exists());
  assert_eq!(
    stdout_lines(&output),
    vec!["app 1.0.0".to_string(), tarball.display().to_string()]
  );
  let calls = packager_calls(&packager)?;
  assert_eq!(
    calls,
    vec![format!(
      "create-release --tarball {} releases/app/app-1.0.0.yml",
      tarball.display()
    ), "--version".to_string()]
  );
  Ok(())
}

#[test]
fn test_fetch_dev_version_builds_named_commit() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  let target = remote.commit_file("releases/app/index.yml", "builds:\n  a: {version: 1.0.0}\n", "1.0.0")?;
  remote.commit_file("src/later.txt", "later", "later work")?;
  let packager = fake_packager(&remote.work)?;
  remote.write_config("dev_releases = true", &format!("tool = \"{}\"", packager.display()))?;

  let version = format!("1.0.1-dev.20200913T122640Z.commit.{}", remote.short(&target)?);
  let output = run_release_rail(&remote.work, &["fetch", &version, "--destination", "out", "--json"])?;

  let fetched: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(fetched["name"], "app");
  assert_eq!(fetched["version"], version.as_str());
  assert_eq!(fetched["tool_version"], "7.1.0-fake");

  let calls = packager_calls(&packager)?;
  assert!(calls[0].starts_with("create-release --force --tarball"));
  assert!(calls[0].ends_with(&format!("--version {}", version)));
  Ok(())
}

#[test]
fn test_fetch_skip_tarball() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  remote.commit_file("releases/app/index.yml", "builds:\n  a: {version: 1.0.0}\n", "1.0.0")?;
  let packager = fake_packager(&remote.work)?;
  remote.write_config("", &format!("tool = \"{}\"", packager.display()))?;

  let output = run_release_rail(&remote.work, &["fetch", "1.0.0", "--skip-tarball"])?;

  assert_eq!(stdout_lines(&output), vec!["app 1.0.0"]);
  assert_eq!(packager_calls(&packager)?, vec!["--version"]);
  Ok(())
}
