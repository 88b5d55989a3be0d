//! Release version resolution and publishing
//!
//! # Core Invariants
//!
//! 1. **Final versions come only from the committed index**
//!    - `releases/<name>/index.yml`, or the legacy `releases/index.yml` when
//!      the named index does not exist at that commit
//!    - Any unparsable version in an index is fatal
//!
//! 2. **Dev versions are never committed**
//!    - One per mainline commit: highest indexed version, patch bumped,
//!      prerelease `dev.<UTC timestamp>.commit.<short hash>`
//!    - The commit hash is always the fourth prerelease identifier
//!
//! 3. **Publishing never rewrites remote history**
//!    - Fast-forward pulls only; rejected pushes are rebased and retried
//!
//! # Architecture
//!
//! - **version**: `ReleaseVersion`, `VersionConstraint`
//! - **index**: index parsing, selection, and the legacy-layout fallback
//! - **dev**: `DevVersionSynthesizer`
//! - **metadata**: final.yml, release manifests, private.yml
//! - **tool**: the external packaging tool
//! - **finalize**: `ReleaseFinalizer`

pub mod dev;
pub mod finalize;
pub mod index;
pub mod metadata;
pub mod tool;
pub mod version;

use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::core::sync::RepositorySync;
use dev::DevVersionSynthesizer;
use index::read_index_at;
use metadata::{manifest_path, read_release_name, write_private_config};
use std::collections::BTreeMap;
use std::path::Path;
use tool::ReleaseTool;
use version::{ReleaseVersion, VersionConstraint};

/// A release living in a synchronized working copy
pub struct Release<'a> {
  sync: &'a RepositorySync,
  private_config: Option<&'a BTreeMap<String, serde_json::Value>>,
}

impl<'a> Release<'a> {
  pub fn new(sync: &'a RepositorySync, private_config: Option<&'a BTreeMap<String, serde_json::Value>>) -> Self {
    Self { sync, private_config }
  }

  /// The explicit name, or the one recorded in `config/final.yml`
  pub fn name(&self, explicit: Option<&str>) -> ReleaseResult<String> {
    match explicit.filter(|n| !n.is_empty()) {
      Some(name) => Ok(name.to_string()),
      None => read_release_name(self.sync.path()).context("discovering name"),
    }
  }

  /// Final versions at HEAD, filtered, highest first
  pub fn versions(
    &self,
    name: &str,
    constraints: &[VersionConstraint],
    always_include: Option<&str>,
  ) -> ReleaseResult<Vec<ReleaseVersion>> {
    let index = read_index_at(self.sync, "HEAD", name)?;
    Ok(index.select(constraints, always_include))
  }

  /// Dev versions for every mainline commit after `since_commit`, highest first
  pub fn dev_versions(&self, name: &str, since_commit: Option<&str>) -> ReleaseResult<Vec<ReleaseVersion>> {
    let commits = self.sync.commits_since(since_commit)?;
    DevVersionSynthesizer::new(self.sync, name).synthesize(&commits)
  }

  /// Build the tarball of a finalized version from its committed manifest
  pub fn create_tarball(&self, tool: &dyn ReleaseTool, name: &str, version: &str, tarball: &Path) -> ReleaseResult<()> {
    write_private_config(self.sync.path(), self.private_config).context("private.yml")?;
    tool
      .create_release(self.sync.path(), &manifest_path(name, version), tarball)
      .context("creating tarball")
  }

  /// Check out a dev version's commit and build it with that exact version
  pub fn create_dev_tarball(&self, tool: &dyn ReleaseTool, version: &ReleaseVersion, tarball: &Path) -> ReleaseResult<()> {
    let commit = version.dev_commit().ok_or_else(|| {
      ReleaseError::with_help(
        format!("{} is not a dev version: commit expected in prerelease", version),
        "Dev versions look like 1.2.4-dev.20240101T000000Z.commit.abc1234",
      )
    })?;

    self.sync.checkout(commit).context("checking out dev release")?;
    write_private_config(self.sync.path(), self.private_config).context("private.yml")?;
    tool
      .create_dev_release(self.sync.path(), Some(version.raw()), tarball)
      .context("creating tarball")
  }
}
