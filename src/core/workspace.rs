//! Working-copy placement for repository identities
//!
//! A [`RepositoryIdentity`] is a (remote URL, branch) pair. The
//! [`WorkingCopyRegistry`] maps each identity to exactly one local directory
//! so repeated invocations reuse the same checkout. Explicit entries win over
//! the derived location, which lets callers (and tests) pin an identity to an
//! isolated path.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// One remote branch of a release repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryIdentity {
  pub remote_url: String,
  /// Empty branch means "whatever the remote's HEAD points at"
  pub branch: Option<String>,
}

impl RepositoryIdentity {
  pub fn new(remote_url: impl Into<String>, branch: Option<String>) -> Self {
    Self {
      remote_url: remote_url.into(),
      branch: branch.filter(|b| !b.is_empty()),
    }
  }

  /// Stable digest of the identity, used to name its cache directory
  pub fn digest(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.remote_url.as_bytes());
    // Separator keeps ("ab", "c") and ("a", "bc") apart
    hasher.update([0u8]);
    hasher.update(self.branch.as_deref().unwrap_or("").as_bytes());
    format!("{:x}", hasher.finalize())
  }
}

impl fmt::Display for RepositoryIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.branch {
      Some(branch) => write!(f, "{}#{}", self.remote_url, branch),
      None => write!(f, "{}", self.remote_url),
    }
  }
}

/// Registry of working-copy locations keyed by identity
#[derive(Debug, Clone)]
pub struct WorkingCopyRegistry {
  root: PathBuf,
  entries: HashMap<RepositoryIdentity, PathBuf>,
}

impl WorkingCopyRegistry {
  /// Registry rooted at `root`; unregistered identities get `root/release-<digest>`
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      entries: HashMap::new(),
    }
  }

  /// Registry rooted in the system temp directory
  pub fn in_temp_dir() -> Self {
    Self::new(std::env::temp_dir())
  }

  /// Pin an identity to an explicit location
  pub fn register(&mut self, identity: RepositoryIdentity, path: impl Into<PathBuf>) -> &mut Self {
    self.entries.insert(identity, path.into());
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Working-copy path for an identity
  pub fn resolve(&self, identity: &RepositoryIdentity) -> PathBuf {
    match self.entries.get(identity) {
      Some(path) => path.clone(),
      None => self.root.join(format!("release-{}", &identity.digest()[..40])),
    }
  }
}
