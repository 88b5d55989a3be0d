//! System git backend
//!
//! Every repository operation is a `git` subprocess run against one working
//! copy. This module builds those commands and turns their exit status into
//! typed [`GitError`]s; higher-level operations live in `system_git_ops`.

use crate::core::credentials::AuthEnv;
use crate::core::error::{GitError, ReleaseError, ReleaseResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Git backend using system git for one working copy
#[derive(Debug, Clone)]
pub struct SystemGit {
  /// Working tree root (may not exist yet before the first clone)
  pub(crate) work_tree: PathBuf,
}

impl SystemGit {
  /// Address a working copy without validating it
  pub fn at(path: impl Into<PathBuf>) -> Self {
    Self { work_tree: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.work_tree
  }

  /// True when the working copy has been cloned
  pub fn is_repository(&self) -> bool {
    self.work_tree.join(".git").exists()
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> ReleaseResult<String> {
    let output = self.run(&["rev-parse", "HEAD"], &[])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Resolve a revision to a full commit sha, or None when it does not exist
  pub fn resolve_commit(&self, revision: &str) -> ReleaseResult<Option<String>> {
    let object = format!("{}^{{commit}}", revision);
    let output = self.output(&["rev-parse", "--verify", "--quiet", &object], &[])?;
    if !output.status.success() {
      return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
  }

  /// Read a file at a specific commit without touching the working tree
  ///
  /// A missing path is reported as [`GitError::PathNotFound`]; a revision that
  /// does not resolve is [`GitError::RevisionNotFound`].
  pub fn read_file_at_commit(&self, revision: &str, path: &str) -> ReleaseResult<Vec<u8>> {
    let object = format!("{}:{}", revision, path);
    let output = self.output(&["show", &object], &[])?;

    if output.status.success() {
      return Ok(output.stdout);
    }

    // Tell "no such file there" apart from "no such commit" by asking git,
    // rather than by interpreting the failed show's message
    if self.resolve_commit(revision)?.is_none() {
      return Err(ReleaseError::Git(GitError::RevisionNotFound {
        revision: revision.to_string(),
      }));
    }

    let tree_entry = self.output(&["cat-file", "-e", &object], &[])?;
    if !tree_entry.status.success() {
      return Err(ReleaseError::Git(GitError::PathNotFound {
        revision: revision.to_string(),
        path: path.to_string(),
      }));
    }

    Err(ReleaseError::Git(GitError::CommandFailed {
      command: format!("git show {}", object),
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }))
  }

  /// Run git and require success
  pub(crate) fn run(&self, args: &[&str], auth: &AuthEnv) -> ReleaseResult<Output> {
    let output = self.output(args, auth)?;

    if !output.status.success() {
      return Err(ReleaseError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(output)
  }

  /// Run git and hand back the raw output regardless of exit status
  pub(crate) fn output(&self, args: &[&str], auth: &AuthEnv) -> ReleaseResult<Output> {
    tracing::debug!(cwd = %self.work_tree.display(), "git {}", args.join(" "));

    let mut cmd = self.git_cmd();
    cmd.args(args);
    cmd.envs(auth.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    cmd.output().map_err(|e| {
      ReleaseError::Git(GitError::Spawn {
        command: format!("git {}", args.first().copied().unwrap_or_default()),
        reason: e.to_string(),
      })
    })
  }

  /// Create a git command bound to the working copy
  ///
  /// - Sets working directory to the working copy
  /// - Never prompts on a terminal
  /// - Adds safe configuration overrides
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.work_tree);

    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.stdin(Stdio::null());

    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false"); // Don't escape non-ASCII

    cmd
  }
}
