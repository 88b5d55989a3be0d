//! Integration tests for `release-rail check`

use crate::helpers::{ReleaseRemote, run_release_rail, run_release_rail_unchecked, stdout_lines};
use anyhow::Result;

const INDEX: &str = r#"builds:
  5c7a0d2e:
    version: 1.0.0
  9b1f3c44:
    version: 1.1.0
  e2d8a6f0:
    version: 2.0.0
"#;

#[test]
fn test_check_without_prior_emits_latest() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  remote.commit_file("releases/app/index.yml", INDEX, "Final releases")?;
  remote.write_config("", "")?;

  let output = run_release_rail(&remote.work, &["check"])?;
  assert_eq!(stdout_lines(&output), vec!["2.0.0"]);
  Ok(())
}

#[test]
fn test_check_with_prior_lists_newer_versions() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  remote.commit_file("releases/app/index.yml", INDEX, "Final releases")?;
  remote.write_config("", "")?;

  let output = run_release_rail(&remote.work, &["check", "--prior", "1.0.0"])?;
  assert_eq!(stdout_lines(&output), vec!["2.0.0", "1.1.0"]);

  let output = run_release_rail(&remote.work, &["check", "--prior", "1.0.0", "--include-prior"])?;
  assert_eq!(stdout_lines(&output), vec!["2.0.0", "1.1.0", "1.0.0"]);
  Ok(())
}

#[test]
fn test_check_applies_configured_constraint() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  remote.commit_file("releases/app/index.yml", INDEX, "Final releases")?;
  remote.write_config("version = \"~1\"", "")?;

  let output = run_release_rail(&remote.work, &["check", "--prior", "1.0.0"])?;
  assert_eq!(stdout_lines(&output), vec!["1.1.0"]);

  let output = run_release_rail(&remote.work, &["check", "--prior", "1.0.0", "--constraint", ">=2.0.0"])?;
  assert_eq!(stdout_lines(&output), vec!["2.0.0"]);
  Ok(())
}

#[test]
fn test_check_sees_new_remote_commits() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  remote.commit_file("releases/app/index.yml", "builds:\n  a: {version: 1.0.0}\n", "1.0.0")?;
  remote.write_config("", "")?;

  let output = run_release_rail(&remote.work, &["check"])?;
  assert_eq!(stdout_lines(&output), vec!["1.0.0"]);

  remote.commit_file(
    "releases/app/index.yml",
    "builds:\n  a: {version: 1.0.0}\n  b: {version: 1.2.0}\n",
    "1.2.0",
  )?;
  let output = run_release_rail(&remote.work, &["check", "--prior", "1.0.0"])?;
  assert_eq!(stdout_lines(&output), vec!["1.2.0"]);
  Ok(())
}

#[test]
fn test_check_dev_versions_since_prior() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  let base = 1_600_000_000;
  let first = remote.commit_file_at("releases/app/index.yml", "builds:\n  a: {version: 1.0.0}\n", "1.0.0", base)?;
  let second = remote.commit_file_at(
    "releases/app/index.yml",
    "builds:\n  a: {version: 1.0.0}\n  b: {version: 1.1.0}\n",
    "1.1.0",
    base + 3600,
  )?;
  let third = remote.commit_file_at(
    "releases/app/index.yml",
    "builds:\n  a: {version: 1.0.0}\n  b: {version: 1.1.0}\n  c: {version: 2.0.0}\n",
    "2.0.0",
    base + 7200,
  )?;
  remote.write_config("dev_releases = true", "")?;

  let prior = format!("1.0.1-dev.20200913T122640Z.commit.{}", remote.short(&first)?);
  let output = run_release_rail(&remote.work, &["check", "--prior", &prior])?;

  assert_eq!(
    stdout_lines(&output),
    vec![
      format!("2.0.1-dev.20200913T142640Z.commit.{}", remote.short(&third)?),
      format!("1.1.1-dev.20200913T132640Z.commit.{}", remote.short(&second)?),
    ]
  );
  Ok(())
}

#[test]
fn test_check_dev_without_prior_reports_head() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  let head = remote.commit_file_at("releases/app/index.yml", "builds:\n  a: {version: 3.2.1}\n", "3.2.1", 1_600_000_000)?;
  remote.write_config("", "")?;

  let output = run_release_rail(&remote.work, &["check", "--dev-releases"])?;
  assert_eq!(
    stdout_lines(&output),
    vec![format!("3.2.2-dev.20200913T122640Z.commit.{}", remote.short(&head)?)]
  );
  Ok(())
}

#[test]
fn test_check_legacy_index_layout() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  remote.commit_file("releases/index.yml", "builds:\n  a: {version: '261'}\n  b: {version: '262.3'}\n", "legacy")?;
  remote.write_config("", "")?;

  let output = run_release_rail(&remote.work, &["check", "--prior", "1"])?;
  assert_eq!(stdout_lines(&output), vec!["262.3", "261"]);
  Ok(())
}

#[test]
fn test_check_json_output() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  remote.commit_file("releases/app/index.yml", INDEX, "Final releases")?;
  remote.write_config("", "")?;

  let output = run_release_rail(&remote.work, &["check", "--prior", "1.0.0", "--json"])?;
  let versions: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(versions, serde_json::json!([{"version": "2.0.0"}, {"version": "1.1.0"}]));
  Ok(())
}

#[test]
fn test_check_malformed_index_fails() -> Result<()> {
  let remote = ReleaseRemote::new()?;
  remote.commit_file("releases/app/index.yml", "builds:\n  a: {version: banana}\n", "broken")?;
  remote.write_config("", "")?;

  let output = run_release_rail_unchecked(&remote.work, &["check"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(output.stdout.is_empty());
  Ok(())
}

#[test]
fn test_check_without_repository_is_user_error() -> Result<()> {
  let remote = ReleaseRemote::new()?;

  let output = run_release_rail_unchecked(&remote.work, &["check"])?;
  assert_eq!(output.status.code(), Some(1));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("source.repository"), "stderr: {}", stderr);
  Ok(())
}
