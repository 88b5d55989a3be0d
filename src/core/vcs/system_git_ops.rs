//! Additional operations for SystemGit (clone/pull/push, commits, tags, log)

use super::Commit;
use super::system_git::SystemGit;
use crate::core::credentials::AuthEnv;
use crate::core::error::{GitError, ReleaseError, ReleaseResult, ResultExt};
use chrono::{DateTime, Utc};
use std::fs;

impl SystemGit {
  /// Clone `url` into the (possibly missing) working tree directory
  pub fn clone_from(&self, url: &str, branch: Option<&str>, auth: &AuthEnv) -> ReleaseResult<()> {
    fs::create_dir_all(&self.work_tree)
      .with_context(|| format!("creating working copy {}", self.work_tree.display()))?;

    let mut args = vec!["clone", "--quiet", url];
    if let Some(branch) = branch {
      args.extend(["--branch", branch]);
    }
    args.push(".");

    self.run(&args, auth)?;
    Ok(())
  }

  /// Fast-forward-only pull from `url`
  pub fn pull_ff_only(&self, url: &str, branch: Option<&str>, auth: &AuthEnv) -> ReleaseResult<()> {
    let mut args = vec!["pull", "--ff-only", "--quiet", url];
    if let Some(branch) = branch {
      args.push(branch);
    }

    let output = self.output(&args, auth)?;
    if output.status.success() {
      return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if stderr.contains("fast-forward") || stderr.contains("diverg") {
      return Err(ReleaseError::Git(GitError::NotFastForward {
        remote: url.to_string(),
        branch: branch.unwrap_or("HEAD").to_string(),
        stderr,
      }));
    }

    Err(ReleaseError::Git(GitError::CommandFailed {
      command: format!("git {}", args.join(" ")),
      stderr,
    }))
  }

  /// Rebase local commits onto `url`'s branch
  pub fn pull_rebase(&self, url: &str, branch: &str, auth: &AuthEnv) -> ReleaseResult<()> {
    self.run(&["pull", "--rebase", "--quiet", url, branch], auth)?;
    Ok(())
  }

  /// Push HEAD to `origin/<branch>`
  ///
  /// Any failure is reported as [`GitError::PushRejected`] so callers can
  /// decide whether to rebase and try again.
  pub fn push_head(&self, branch: &str, auth: &AuthEnv) -> Result<(), GitError> {
    let refspec = format!("HEAD:{}", branch);
    let output = self
      .output(&["push", "--quiet", "origin", &refspec], auth)
      .map_err(|e| match e {
        ReleaseError::Git(git) => git,
        other => GitError::Spawn {
          command: "git push".to_string(),
          reason: other.to_string(),
        },
      })?;

    if output.status.success() {
      return Ok(());
    }

    Err(GitError::PushRejected {
      remote: "origin".to_string(),
      refspec,
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
  }

  /// Push a single tag to origin
  pub fn push_tag(&self, tag: &str, auth: &AuthEnv) -> ReleaseResult<()> {
    let refspec = format!("refs/tags/{}", tag);
    self.run(&["push", "--quiet", "origin", &refspec], auth)?;
    Ok(())
  }

  /// Set a repository-local config value
  pub fn set_config(&self, key: &str, value: &str) -> ReleaseResult<()> {
    self.run(&["config", key, value], &[])?;
    Ok(())
  }

  /// Stage every change in the working tree, including deletions
  pub fn stage_all(&self) -> ReleaseResult<()> {
    self.run(&["add", "-A", "."], &[])?;
    Ok(())
  }

  /// Commit whatever is staged
  pub fn commit_staged(&self, message: &str) -> ReleaseResult<()> {
    self.run(&["commit", "--quiet", "-m", message], &[])?;
    Ok(())
  }

  /// Amend HEAD keeping its message but taking the current identity and time
  pub fn amend_reset_author(&self) -> ReleaseResult<()> {
    self.run(&["commit", "--quiet", "--amend", "--reset-author", "--no-edit"], &[])?;
    Ok(())
  }

  /// Create an annotated tag at `commit`
  pub fn create_annotated_tag(&self, tag: &str, commit: &str, message: &str) -> ReleaseResult<()> {
    self.run(&["tag", "-a", "-m", message, tag, commit], &[])?;
    Ok(())
  }

  /// Move the working tree to a commit (detached)
  pub fn checkout(&self, commitish: &str) -> ReleaseResult<()> {
    self.run(&["checkout", "--quiet", commitish], &[])?;
    Ok(())
  }

  /// Mainline commits from HEAD back to (excluding) `since`
  ///
  /// Only first parents are followed, so commits that reached the mainline
  /// through a merge's side branch never appear. Without `since` only HEAD
  /// itself is returned.
  pub fn first_parent_log(&self, since: Option<&str>) -> ReleaseResult<Vec<Commit>> {
    let range = since.map(|s| format!("{}..HEAD", s));
    let mut args = vec!["log", "--first-parent", "--format=%h %H %ct"];
    match range.as_deref() {
      Some(range) => args.push(range),
      None => args.extend(["-n", "1", "HEAD"]),
    }

    let output = self.run(&args, &[])?;
    parse_log_output(&String::from_utf8_lossy(&output.stdout))
  }
}

/// Parse `%h %H %ct` lines into commits
pub(crate) fn parse_log_output(stdout: &str) -> ReleaseResult<Vec<Commit>> {
  stdout
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(parse_log_line)
    .collect()
}

fn parse_log_line(line: &str) -> ReleaseResult<Commit> {
  let unexpected = || {
    ReleaseError::Git(GitError::UnexpectedOutput {
      command: "git log".to_string(),
      output: line.to_string(),
    })
  };

  let mut fields = line.split_whitespace();
  let (Some(short), Some(full), Some(seconds), None) = (fields.next(), fields.next(), fields.next(), fields.next())
  else {
    return Err(unexpected());
  };
  if !full.starts_with(short) {
    return Err(unexpected());
  }

  let seconds: i64 = seconds.parse().map_err(|_| unexpected())?;
  let timestamp: DateTime<Utc> = DateTime::from_timestamp(seconds, 0).ok_or_else(unexpected)?;

  Ok(Commit {
    short_hash: identifier_safe_abbrev(short, full).to_string(),
    timestamp,
  })
}

/// Lengthen an all-digit abbreviation until it contains a letter
///
/// An all-digit hash reads as a numeric semver identifier, which must not
/// have a leading zero. Any longer prefix of the full hash is still unique.
fn identifier_safe_abbrev<'a>(short: &'a str, full: &'a str) -> &'a str {
  if !short.bytes().all(|b| b.is_ascii_digit()) {
    return short;
  }
  match full.bytes().skip(short.len()).position(|b| !b.is_ascii_digit()) {
    Some(offset) => &full[..short.len() + offset + 1],
    None => full,
  }
}
