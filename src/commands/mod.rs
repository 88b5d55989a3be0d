//! CLI commands for release-rail
//!
//! - **check**: list versions that exist (or are new since a prior version)
//! - **fetch**: build the tarball of one version
//! - **publish**: finalize a tarball into the index, push, and tag
//!
//! Every command works on the configured source repository through one
//! [`RepositorySync`], pulled before anything else happens.

pub mod check;
pub mod fetch;
pub mod publish;

pub use check::run_check;
pub use fetch::run_fetch;
pub use publish::run_publish;

use crate::core::config::{RailConfig, SourceConfig};
use crate::core::credentials::CredentialScope;
use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, ResultExt};
use crate::core::sync::RepositorySync;
use crate::core::workspace::{RepositoryIdentity, WorkingCopyRegistry};
use crate::release::tool::BoshCli;
use std::path::PathBuf;

/// Bind the configured source to its cached working copy
pub(crate) fn open_source(source: &SourceConfig) -> ReleaseResult<RepositorySync> {
  source.validate()?;

  let identity = RepositoryIdentity::new(source.repository()?, source.branch.clone());
  let registry = match &source.cache_dir {
    Some(dir) => WorkingCopyRegistry::new(dir),
    None => WorkingCopyRegistry::in_temp_dir(),
  };
  let credentials = CredentialScope::new(source.private_key.clone());

  Ok(RepositorySync::new(identity, &registry, credentials))
}

/// Open the source and bring the working copy up to date
pub(crate) fn pull_source(source: &SourceConfig) -> ReleaseResult<RepositorySync> {
  let sync = open_source(source)?;
  sync.pull().context("pulling")?;
  Ok(sync)
}

/// The packaging tool named in configuration
pub(crate) fn packaging_tool(config: &RailConfig) -> BoshCli {
  BoshCli::new(config.publish.tool.clone())
}

/// Resolve a glob that must match exactly one path
pub(crate) fn single_match(pattern: &str, field: &str) -> ReleaseResult<PathBuf> {
  let invalid = |reason: &str| {
    ReleaseError::Config(ConfigError::Invalid {
      field: field.to_string(),
      reason: format!("{} ({})", reason, pattern),
    })
  };

  let mut matches = glob::glob(pattern)
    .with_context(|| format!("globbing {}", field))?
    .filter_map(Result::ok);

  let first = matches.next().ok_or_else(|| invalid("path not found"))?;
  if matches.next().is_some() {
    return Err(invalid("multiple files matched"));
  }
  Ok(first)
}
