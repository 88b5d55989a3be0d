//! `release-rail publish`: finalize a tarball and push it to the release repository

use crate::commands::{packaging_tool, pull_source, single_match};
use crate::core::config::RailConfig;
use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, ResultExt};
use crate::release::Release;
use crate::release::finalize::{FinalizeOptions, FinalizedRelease, ReleaseFinalizer};
use crate::release::metadata::write_private_config;
use crate::release::tool::ReleaseTool;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Where the tarball to finalize comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TarballSource {
  /// Glob matching exactly one existing tarball
  Glob(String),
  /// A release directory built into `release.tgz` before finalizing
  Repository(PathBuf),
}

/// Inputs of one publish
#[derive(Debug, Clone)]
pub struct PublishRequest {
  /// Glob of the file holding the version
  pub version_file: String,
  /// Glob of the file holding the commit message
  pub commit_file: Option<String>,
  pub tarball: TarballSource,
}

#[derive(Debug, Serialize)]
struct PublishOutput<'a> {
  #[serde(flatten)]
  release: &'a FinalizedRelease,
  tool_version: String,
}

/// Read a file matched by `pattern`, trimmed
fn read_matched(pattern: &str, field: &str) -> ReleaseResult<String> {
  let path = single_match(pattern, field)?;
  let content = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
  Ok(content.trim().to_string())
}

/// Resolve the tarball to finalize, building it first when it comes from a directory
fn resolve_tarball(source: &TarballSource, tool: &dyn ReleaseTool, config: &RailConfig) -> ReleaseResult<PathBuf> {
  match source {
    TarballSource::Glob(pattern) => {
      let path = single_match(pattern, "tarball")?;
      Ok(std::path::absolute(&path).with_context(|| format!("resolving {}", path.display()))?)
    }
    TarballSource::Repository(dir) => {
      let dir = std::path::absolute(dir).with_context(|| format!("resolving {}", dir.display()))?;
      let tarball = dir.join("release.tgz");
      write_private_config(&dir, config.source.private_config.as_ref()).context("private.yml")?;
      tool
        .create_dev_release(&dir, None, &tarball)
        .context("creating release from repository")?;
      Ok(tarball)
    }
  }
}

/// Finalize, commit, push, and tag one release
pub fn publish_release(
  release: &Release<'_>,
  finalizer: &ReleaseFinalizer<'_>,
  tool: &dyn ReleaseTool,
  config: &RailConfig,
  request: &PublishRequest,
) -> ReleaseResult<FinalizedRelease> {
  let version = read_matched(&request.version_file, "version_file").context("reading version")?;
  if version.is_empty() {
    return Err(ReleaseError::Config(ConfigError::Invalid {
      field: "version_file".to_string(),
      reason: "version file is empty".to_string(),
    }));
  }

  let name = release.name(config.source.name.as_deref())?;
  let tarball = resolve_tarball(&request.tarball, tool, config)?;

  tracing::info!(name = %name, version = %version, tarball = %tarball.display(), "publishing");
  finalizer.finalize(&name, &version, &tarball)
}

/// Run the publish command
pub fn run_publish(config: &RailConfig, request: &PublishRequest, json: bool) -> ReleaseResult<()> {
  config.source.required_branch()?;

  let message = match &request.commit_file {
    Some(pattern) => Some(read_matched(pattern, "commit_file").context("reading commit message")?),
    None => None,
  };

  let sync = pull_source(&config.source)?;
  sync
    .configure(&config.publish.author_name, &config.publish.author_email)
    .context("configuring author")?;

  let tool = packaging_tool(config);
  let release = Release::new(&sync, config.source.private_config.as_ref());
  let finalizer = ReleaseFinalizer::new(&sync, &tool)
    .with_private_config(config.source.private_config.as_ref())
    .with_options(FinalizeOptions {
      message,
      rebase: config.publish.rebase,
      skip_tag: config.publish.skip_tag,
    });

  let published = publish_release(&release, &finalizer, &tool, config, request)?;
  let tool_version = tool.version();

  if json {
    let output = PublishOutput {
      release: &published,
      tool_version,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
  } else {
    println!("{} {}", published.name, published.version);
    println!("commit {}", published.commit);
    if let Some(tag) = &published.tag {
      println!("tag {} -> {}", tag, published.source_commit);
    }
  }

  Ok(())
}

/// Anchor a relative glob pattern at `base`; absolute patterns pass through
pub fn anchor_pattern(base: &Path, pattern: &str) -> String {
  if Path::new(pattern).is_absolute() || base.as_os_str().is_empty() || base == Path::new(".") {
    pattern.to_string()
  } else {
    base.join(pattern).to_string_lossy().to_string()
  }
}
