//! Repository synchronization for one (remote, branch) working copy
//!
//! [`RepositorySync`] owns the cached working copy for a [`RepositoryIdentity`]
//! and exposes the handful of git operations release resolution and publishing
//! need. Network operations (clone, pull, push) run inside the
//! [`CredentialScope`]; everything else is local.
//!
//! Publishing uses optimistic concurrency: commit locally, push, and when the
//! remote rejects the push, rebase onto the new remote state and try again a
//! bounded number of times. The sleep between attempts goes through the
//! [`Backoff`] trait so tests can observe it without waiting.

use crate::core::credentials::CredentialScope;
use crate::core::error::{ConfigError, GitError, ReleaseError, ReleaseResult, ResultExt};
use crate::core::vcs::{Commit, SystemGit};
use crate::core::workspace::{RepositoryIdentity, WorkingCopyRegistry};
use std::path::Path;
use std::time::Duration;

/// Bound and spacing of push retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Rebase-and-push attempts after the first rejected push
  pub attempts: u32,
  /// Sleep before each rebase attempt
  pub backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      attempts: 3,
      backoff: Duration::from_secs(5),
    }
  }
}

/// Sleep strategy between push attempts
pub trait Backoff {
  fn sleep(&self, duration: Duration);
}

/// Real sleeping on the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Backoff for ThreadSleep {
  fn sleep(&self, duration: Duration) {
    std::thread::sleep(duration);
  }
}

/// One cached working copy and the operations performed on it
pub struct RepositorySync {
  identity: RepositoryIdentity,
  git: SystemGit,
  credentials: CredentialScope,
  retry: RetryPolicy,
  backoff: Box<dyn Backoff>,
}

impl RepositorySync {
  /// Bind an identity to its working copy location from the registry
  pub fn new(identity: RepositoryIdentity, registry: &WorkingCopyRegistry, credentials: CredentialScope) -> Self {
    let path = registry.resolve(&identity);
    Self {
      identity,
      git: SystemGit::at(path),
      credentials,
      retry: RetryPolicy::default(),
      backoff: Box::new(ThreadSleep),
    }
  }

  pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
    self.backoff = Box::new(backoff);
    self
  }

  pub fn identity(&self) -> &RepositoryIdentity {
    &self.identity
  }

  /// Local working copy path
  pub fn path(&self) -> &Path {
    self.git.path()
  }

  /// Clone on first use, fast-forward afterwards
  ///
  /// Never resets: a working copy that cannot be fast-forwarded is an error.
  pub fn pull(&self) -> ReleaseResult<()> {
    let url = self.identity.remote_url.as_str();
    let branch = self.identity.branch.as_deref();

    if self.git.is_repository() {
      tracing::info!(repository = %self.identity, path = %self.path().display(), "pulling");
      self
        .credentials
        .with_credentials(|auth| self.git.pull_ff_only(url, branch, auth))
        .with_context(|| format!("fetching {}", self.identity))
    } else {
      tracing::info!(repository = %self.identity, path = %self.path().display(), "cloning");
      self
        .credentials
        .with_credentials(|auth| self.git.clone_from(url, branch, auth))
        .with_context(|| format!("cloning {}", self.identity))
    }
  }

  /// Set the identity used for commits and tags in this working copy
  pub fn configure(&self, author_name: &str, author_email: &str) -> ReleaseResult<()> {
    self.git.set_config("user.name", author_name).context("setting user.name")?;
    self.git.set_config("user.email", author_email).context("setting user.email")?;
    Ok(())
  }

  /// Stage everything, commit, and push to the tracked branch
  ///
  /// With `allow_rebase_retry`, a rejected push is retried up to the policy
  /// bound: sleep, `pull --rebase`, amend with a fresh author, push again.
  /// Returns the full sha of the pushed HEAD. A failed push leaves the local
  /// commit in place.
  pub fn commit(&self, message: &str, allow_rebase_retry: bool) -> ReleaseResult<String> {
    let branch = self.tracked_branch()?;
    let url = self.identity.remote_url.as_str();

    tracing::info!(branch, "committing");
    self.git.stage_all().context("adding files")?;
    self.git.commit_staged(message).context("committing")?;

    let budget = if allow_rebase_retry { self.retry.attempts } else { 0 };
    let mut retries = 0;

    loop {
      let pushed = self.credentials.with_credentials(|auth| {
        self.git.push_head(branch, auth).map_err(ReleaseError::Git)
      });

      let err = match pushed {
        Ok(()) => break,
        Err(ReleaseError::Git(err @ GitError::PushRejected { .. })) => err,
        Err(other) => return Err(other.context("pushing")),
      };

      if retries >= budget {
        let err = if retries == 0 {
          ReleaseError::Git(err)
        } else {
          ReleaseError::Git(GitError::RetriesExhausted {
            attempts: retries,
            last: Box::new(err),
          })
        };
        return Err(err.context("pushing"));
      }

      retries += 1;
      tracing::warn!(
        attempt = retries,
        of = budget,
        backoff_secs = self.retry.backoff.as_secs(),
        "push rejected; rebasing and retrying"
      );
      self.backoff.sleep(self.retry.backoff);

      self
        .credentials
        .with_credentials(|auth| self.git.pull_rebase(url, branch, auth))
        .context("rebasing")?;
      self.git.amend_reset_author().context("resetting commit")?;
    }

    self.git.head_commit().context("resolving HEAD")
  }

  /// Create an annotated tag at `commit` and push it; never retried
  pub fn tag(&self, commit: &str, tag: &str, message: &str) -> ReleaseResult<()> {
    tracing::info!(tag, commit, "tagging");
    self.git.create_annotated_tag(tag, commit, message).context("tagging")?;
    self
      .credentials
      .with_credentials(|auth| self.git.push_tag(tag, auth))
      .context("pushing tag")
  }

  /// Read a file as of a commit without touching the working tree
  pub fn show_file_at_revision(&self, commit: &str, path: &str) -> ReleaseResult<Vec<u8>> {
    self.git.read_file_at_commit(commit, path)
  }

  /// First-parent commits from HEAD back to (excluding) `since`, or HEAD alone
  pub fn commits_since(&self, since: Option<&str>) -> ReleaseResult<Vec<Commit>> {
    let since = since.filter(|s| !s.is_empty());
    self.git.first_parent_log(since).context("loading commits")
  }

  /// Move the working copy to a commit
  pub fn checkout(&self, commitish: &str) -> ReleaseResult<()> {
    tracing::info!(commitish, "checking out");
    self
      .git
      .checkout(commitish)
      .with_context(|| format!("checking out {}", commitish))
  }

  fn tracked_branch(&self) -> ReleaseResult<&str> {
    self.identity.branch.as_deref().ok_or_else(|| {
      ReleaseError::Config(ConfigError::MissingField {
        field: "source.branch".to_string(),
      })
    })
  }
}
