//! Dev versions synthesized from mainline history
//!
//! Each commit yields one speculative version: the highest final version in
//! that commit's index with the patch bumped, tagged with the commit's time
//! and hash. Nothing here is ever written back to the index.

use crate::core::error::{IndexError, ReleaseError, ReleaseResult, ResultExt};
use crate::core::vcs::Commit;
use crate::release::index::{RevisionFiles, read_index_at};
use crate::release::version::ReleaseVersion;

/// Builds dev versions for a named release from a history reader
pub struct DevVersionSynthesizer<'a, R: RevisionFiles> {
  repo: &'a R,
  name: &'a str,
}

impl<'a, R: RevisionFiles> DevVersionSynthesizer<'a, R> {
  pub fn new(repo: &'a R, name: &'a str) -> Self {
    Self { repo, name }
  }

  /// One dev version per commit, highest first
  pub fn synthesize(&self, commits: &[Commit]) -> ReleaseResult<Vec<ReleaseVersion>> {
    let mut versions = commits
      .iter()
      .map(|commit| self.dev_version(commit))
      .collect::<ReleaseResult<Vec<_>>>()?;

    versions.sort_by(|a, b| b.cmp(a));
    Ok(versions)
  }

  fn dev_version(&self, commit: &Commit) -> ReleaseResult<ReleaseVersion> {
    let index = read_index_at(self.repo, &commit.short_hash, self.name)?;
    let base = index
      .latest()
      .ok_or(ReleaseError::Index(IndexError::Empty))
      .with_context(|| format!("parsing releases index.yml for {}", commit.short_hash))?;

    let dev = base
      .dev_successor(commit)
      .with_context(|| format!("creating version for {}", commit.short_hash))?;
    tracing::debug!(commit = %commit.short_hash, base = %base, dev = %dev, "synthesized dev version");
    Ok(dev)
  }
}
