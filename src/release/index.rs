//! Version index (`releases/<name>/index.yml`) parsing and selection

use crate::core::error::{GitError, IndexError, ReleaseError, ReleaseResult, ResultExt};
use crate::core::sync::RepositorySync;
use crate::core::vcs::SystemGit;
use crate::release::version::{ReleaseVersion, VersionConstraint};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Index location used by releases that predate per-name directories
pub const LEGACY_INDEX_PATH: &str = "releases/index.yml";

/// Index location for a named release
pub fn index_path(name: &str) -> String {
  format!("releases/{}/index.yml", name)
}

#[derive(Debug, Deserialize)]
struct IndexDocument {
  #[serde(default)]
  builds: Option<BTreeMap<String, IndexBuild>>,
}

#[derive(Debug, Deserialize)]
struct IndexBuild {
  /// Scalar text as written, so an unquoted `1.10` stays `1.10`
  version: String,
}

/// Every version recorded in an index, highest first
#[derive(Debug, Clone, Default)]
pub struct VersionIndex {
  versions: Vec<ReleaseVersion>,
}

impl VersionIndex {
  /// Parse index bytes; any unparsable version fails the whole index
  pub fn parse(bytes: &[u8]) -> ReleaseResult<Self> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
      return Ok(Self::default());
    }

    let document: IndexDocument = serde_yaml::from_slice(bytes).map_err(|e| {
      ReleaseError::Index(IndexError::Malformed {
        what: "index.yml".to_string(),
        reason: e.to_string(),
      })
    })?;

    let mut versions = document
      .builds
      .unwrap_or_default()
      .into_values()
      .map(|build| ReleaseVersion::parse(&build.version))
      .collect::<ReleaseResult<Vec<_>>>()?;

    versions.sort_by(|a, b| b.cmp(a));
    versions.dedup();
    Ok(Self { versions })
  }

  pub fn versions(&self) -> &[ReleaseVersion] {
    &self.versions
  }

  /// The highest version, if the index has any builds
  pub fn latest(&self) -> Option<&ReleaseVersion> {
    self.versions.first()
  }

  /// Versions accepted by every constraint, plus `always_include` if present
  ///
  /// `always_include` is compared against the index's own spelling of each
  /// version. Order stays highest first.
  pub fn select(&self, constraints: &[VersionConstraint], always_include: Option<&str>) -> Vec<ReleaseVersion> {
    self
      .versions
      .iter()
      .filter(|version| always_include == Some(version.raw()) || constraints.iter().all(|c| c.matches(version)))
      .cloned()
      .collect()
  }
}

/// Parse an index and filter it, highest first
pub fn list_versions(
  raw_index: &[u8],
  constraints: &[VersionConstraint],
  always_include: Option<&str>,
) -> ReleaseResult<Vec<ReleaseVersion>> {
  Ok(VersionIndex::parse(raw_index)?.select(constraints, always_include))
}

/// Read access to files as of a commit
pub trait RevisionFiles {
  fn show_file_at_revision(&self, commit: &str, path: &str) -> ReleaseResult<Vec<u8>>;
}

impl RevisionFiles for RepositorySync {
  fn show_file_at_revision(&self, commit: &str, path: &str) -> ReleaseResult<Vec<u8>> {
    RepositorySync::show_file_at_revision(self, commit, path)
  }
}

impl RevisionFiles for SystemGit {
  fn show_file_at_revision(&self, commit: &str, path: &str) -> ReleaseResult<Vec<u8>> {
    self.read_file_at_commit(commit, path)
  }
}

/// Read the index for `name` as of `commit`
///
/// Tries `releases/<name>/index.yml` first. Only when that path does not exist
/// at the commit does it fall back to the legacy top-level index; any other
/// failure is returned as is.
pub fn read_index_at(repo: &impl RevisionFiles, commit: &str, name: &str) -> ReleaseResult<VersionIndex> {
  let primary = index_path(name);
  let bytes = match repo.show_file_at_revision(commit, &primary) {
    Ok(bytes) => bytes,
    Err(err) if err.git().is_some_and(GitError::is_path_not_found) => {
      tracing::debug!(commit, path = %primary, "index missing; trying {}", LEGACY_INDEX_PATH);
      repo
        .show_file_at_revision(commit, LEGACY_INDEX_PATH)
        .with_context(|| format!("loading releases index.yml for {}", commit))?
    }
    Err(err) => return Err(err.context(format!("loading releases index.yml for {}", commit))),
  };

  VersionIndex::parse(&bytes).with_context(|| format!("parsing releases index.yml for {}", commit))
}
