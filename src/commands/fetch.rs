//! `release-rail fetch`: build the tarball of one version

use crate::commands::{packaging_tool, pull_source};
use crate::core::config::RailConfig;
use crate::core::error::{ReleaseResult, ResultExt};
use crate::release::Release;
use crate::release::tool::ReleaseTool;
use crate::release::version::ReleaseVersion;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// What was fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedRelease {
  pub name: String,
  pub version: String,
  /// Absent when tarball creation was skipped
  pub tarball: Option<PathBuf>,
  pub tool_version: String,
}

/// Build `version` into `destination`
///
/// Dev versions are built from the commit named in their prerelease, final
/// versions from their committed manifest.
pub fn fetch_release(
  release: &Release<'_>,
  tool: &dyn ReleaseTool,
  config: &RailConfig,
  version: &str,
  destination: &Path,
  skip_tarball: bool,
) -> ReleaseResult<FetchedRelease> {
  let name = release.name(config.source.name.as_deref())?;
  let version = ReleaseVersion::parse(version).context("parsing version")?;

  let tarball = if skip_tarball {
    None
  } else {
    fs::create_dir_all(destination).with_context(|| format!("creating {}", destination.display()))?;
    let tarball = destination.join(format!("{}-{}.tgz", name, version.raw()));

    if config.source.dev_releases {
      release.create_dev_tarball(tool, &version, &tarball)?;
    } else {
      release.create_tarball(tool, &name, version.raw(), &tarball)?;
    }
    Some(tarball)
  };

  Ok(FetchedRelease {
    name,
    version: version.raw().to_string(),
    tarball,
    tool_version: tool.version(),
  })
}

/// Run the fetch command
pub fn run_fetch(config: &RailConfig, version: &str, destination: &Path, skip_tarball: bool, json: bool) -> ReleaseResult<()> {
  // The packaging tool resolves relative paths against the working copy
  let destination = std::path::absolute(destination).with_context(|| format!("resolving {}", destination.display()))?;

  let sync = pull_source(&config.source)?;
  let release = Release::new(&sync, config.source.private_config.as_ref());
  let tool = packaging_tool(config);

  let fetched = fetch_release(&release, &tool, config, version, &destination, skip_tarball)?;
  tracing::info!(name = %fetched.name, version = %fetched.version, "fetched release");

  if json {
    println!("{}", serde_json::to_string_pretty(&fetched)?);
  } else {
    println!("{} {}", fetched.name, fetched.version);
    if let Some(tarball) = &fetched.tarball {
      println!("{}", tarball.display());
    }
  }

  Ok(())
}
