pub mod system_git;
mod system_git_ops;

pub use system_git::SystemGit;

use chrono::{DateTime, Utc};

/// A mainline commit as seen by version resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
  /// Abbreviated hash, as git prints it with `%h`
  pub short_hash: String,
  /// Committer date in UTC
  pub timestamp: DateTime<Utc>,
}
