//! Git fixtures shared by unit tests

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run git in a directory and return stdout
pub fn git(cwd: &Path, args: &[&str]) -> Result<String> {
  git_with_env(cwd, args, &[])
}

/// Run git with extra environment (commit dates, mostly)
pub fn git_with_env(cwd: &Path, args: &[&str], env: &[(&str, &str)]) -> Result<String> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .envs(env.iter().copied())
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    bail!(
      "git {} failed: {}",
      args.join(" "),
      String::from_utf8_lossy(&output.stderr)
    );
  }

  Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// A throwaway non-bare repository on `main`
pub struct FixtureRepo {
  _root: TempDir,
  path: PathBuf,
}

impl FixtureRepo {
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();
    init_identity(&path, &["init", "--quiet", "--initial-branch=main"])?;
    Ok(Self { _root: root, path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Write a file relative to the repository root, creating parent dirs
  pub fn write(&self, rel: &str, content: &str) -> Result<()> {
    write_file(&self.path, rel, content)
  }

  /// Stage everything and commit; returns the full sha
  pub fn commit(&self, message: &str) -> Result<String> {
    commit_all(&self.path, message, None)
  }

  /// Commit with both author and committer date pinned to `unix_time`
  pub fn commit_at(&self, message: &str, unix_time: i64) -> Result<String> {
    commit_all(&self.path, message, Some(unix_time))
  }
}

/// A bare "remote" plus an upstream clone that other publishers push from
pub struct RemoteFixture {
  root: TempDir,
  bare: PathBuf,
  upstream: PathBuf,
}

impl RemoteFixture {
  /// Bare repository on `main` seeded with one commit
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let bare = root.path().join("remote.git");
    let upstream = root.path().join("upstream");

    git(root.path(), &["init", "--quiet", "--bare", "--initial-branch=main", "remote.git"])?;
    git(root.path(), &["clone", "--quiet", "remote.git", "upstream"])?;
    init_identity(&upstream, &["symbolic-ref", "HEAD", "refs/heads/main"])?;

    write_file(&upstream, "README.md", "release repository\n")?;
    commit_all(&upstream, "Initial commit", None)?;
    git(&upstream, &["push", "--quiet", "origin", "HEAD:main"])?;

    Ok(Self { root, bare, upstream })
  }

  /// URL the code under test clones from
  pub fn url(&self) -> String {
    self.bare.to_string_lossy().to_string()
  }

  /// Path for a working copy owned by the code under test
  pub fn scratch(&self, name: &str) -> PathBuf {
    self.root.path().join(name)
  }

  pub fn upstream(&self) -> &Path {
    &self.upstream
  }

  /// Commit a change in the upstream clone and push it to the remote
  pub fn push_change(&self, rel: &str, content: &str, message: &str) -> Result<String> {
    git(&self.upstream, &["pull", "--quiet", "--ff-only", "origin", "main"])?;
    write_file(&self.upstream, rel, content)?;
    let sha = commit_all(&self.upstream, message, None)?;
    git(&self.upstream, &["push", "--quiet", "origin", "HEAD:main"])?;
    Ok(sha)
  }

  /// Install a pre-receive hook that rejects every push from now on
  #[cfg(unix)]
  pub fn reject_pushes(&self) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let hook = self.bare.join("hooks").join("pre-receive");
    fs::write(&hook, "#!/bin/sh\necho 'rejected by fixture' >&2\nexit 1\n")?;
    fs::set_permissions(&hook, fs::Permissions::from_mode(0o755))?;
    Ok(())
  }

  /// Full sha of a ref in the bare remote
  pub fn rev_parse(&self, rev: &str) -> Result<String> {
    Ok(git(&self.bare, &["rev-parse", rev])?.trim().to_string())
  }
}

fn init_identity(path: &Path, first: &[&str]) -> Result<()> {
  fs::create_dir_all(path)?;
  git(path, first)?;
  git(path, &["config", "user.name", "Fixture User"])?;
  git(path, &["config", "user.email", "fixture@example.com"])?;
  git(path, &["config", "commit.gpgsign", "false"])?;
  git(path, &["config", "tag.gpgsign", "false"])?;
  Ok(())
}

fn write_file(root: &Path, rel: &str, content: &str) -> Result<()> {
  let target = root.join(rel);
  if let Some(parent) = target.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(target, content)?;
  Ok(())
}

fn commit_all(path: &Path, message: &str, unix_time: Option<i64>) -> Result<String> {
  git(path, &["add", "-A", "."])?;

  let date = unix_time.map(|t| format!("@{} +0000", t));
  let env: Vec<(&str, &str)> = match date.as_deref() {
    Some(d) => vec![("GIT_AUTHOR_DATE", d), ("GIT_COMMITTER_DATE", d)],
    None => Vec::new(),
  };
  git_with_env(path, &["commit", "--quiet", "--allow-empty", "-m", message], &env)?;

  Ok(git(path, &["rev-parse", "HEAD"])?.trim().to_string())
}
