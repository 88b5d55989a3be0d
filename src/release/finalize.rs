//! Promote a packaged release into the index and publish it

use crate::core::error::{ReleaseResult, ResultExt};
use crate::core::sync::RepositorySync;
use crate::release::metadata::{ReleaseManifest, manifest_path, write_private_config};
use crate::release::tool::ReleaseTool;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// How the finalized release is committed and tagged
#[derive(Debug, Clone, Default)]
pub struct FinalizeOptions {
  /// Commit message; `Version <version>` when unset
  pub message: Option<String>,
  /// Rebase and retry rejected pushes
  pub rebase: bool,
  /// Do not create the `v<version>` tag
  pub skip_tag: bool,
}

/// Outcome of a successful finalize
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedRelease {
  pub name: String,
  pub version: String,
  /// The pushed commit that records the release in the index
  pub commit: String,
  /// The commit the release was built from (from the manifest)
  pub source_commit: String,
  pub tag: Option<String>,
}

/// Drives the packaging tool and the repository through one finalize
pub struct ReleaseFinalizer<'a> {
  sync: &'a RepositorySync,
  tool: &'a dyn ReleaseTool,
  private_config: Option<&'a BTreeMap<String, serde_json::Value>>,
  options: FinalizeOptions,
}

impl<'a> ReleaseFinalizer<'a> {
  pub fn new(sync: &'a RepositorySync, tool: &'a dyn ReleaseTool) -> Self {
    Self {
      sync,
      tool,
      private_config: None,
      options: FinalizeOptions::default(),
    }
  }

  pub fn with_private_config(mut self, private_config: Option<&'a BTreeMap<String, serde_json::Value>>) -> Self {
    self.private_config = private_config;
    self
  }

  pub fn with_options(mut self, options: FinalizeOptions) -> Self {
    self.options = options;
    self
  }

  /// Finalize `tarball` as `name` at `version`, commit, push, and tag
  ///
  /// The tag points at the manifest's `commit_hash` (the source of the
  /// release), not at the index commit. A tool failure stops before anything
  /// is committed; a push failure leaves the local commit in place.
  pub fn finalize(&self, name: &str, version: &str, tarball: &Path) -> ReleaseResult<FinalizedRelease> {
    let repo = self.sync.path();

    write_private_config(repo, self.private_config).context("private.yml")?;

    tracing::info!(name, version, tarball = %tarball.display(), "finalizing release");
    self
      .tool
      .finalize_release(repo, name, version, tarball)
      .context("finalizing release")?;

    let manifest = ReleaseManifest::load(&repo.join(manifest_path(name, version))).context("reading finalized release")?;

    let message = self
      .options
      .message
      .clone()
      .unwrap_or_else(|| format!("Version {}", version));
    let commit = self.sync.commit(&message, self.options.rebase).context("committing release")?;

    let tag = if self.options.skip_tag {
      None
    } else {
      let tag = format!("v{}", version);
      self.sync.tag(&manifest.commit_hash, &tag, &tag).context("tagging release")?;
      Some(tag)
    };

    Ok(FinalizedRelease {
      name: name.to_string(),
      version: version.to_string(),
      commit,
      source_commit: manifest.commit_hash,
      tag,
    })
  }
}
