//! Release metadata files inside the working copy
//!
//! - `config/final.yml`: the release name (`name`, falling back to `final_name`)
//! - `releases/<name>/<name>-<version>.yml`: the finalized release manifest,
//!   of which only `commit_hash` is interpreted
//! - `config/private.yml`: operator-supplied private configuration, written
//!   before any packaging step

use crate::core::error::{IndexError, ReleaseError, ReleaseResult, ResultExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
struct FinalConfig {
  #[serde(default)]
  name: Option<String>,
  #[serde(default)]
  final_name: Option<String>,
}

impl FinalConfig {
  fn release_name(self) -> Option<String> {
    self
      .name
      .filter(|n| !n.is_empty())
      .or(self.final_name.filter(|n| !n.is_empty()))
  }
}

/// Discover the release name from `config/final.yml`
pub fn read_release_name(repo_root: &Path) -> ReleaseResult<String> {
  let path = repo_root.join("config").join("final.yml");
  let bytes = fs::read(&path).context("reading final.yml")?;

  let config: FinalConfig = serde_yaml::from_slice(&bytes)
    .map_err(|e| {
      ReleaseError::Index(IndexError::Malformed {
        what: "config/final.yml".to_string(),
        reason: e.to_string(),
      })
    })
    .context("parsing final.yml")?;

  config.release_name().ok_or_else(|| {
    ReleaseError::Index(IndexError::Malformed {
      what: "config/final.yml".to_string(),
      reason: "neither name nor final_name is set".to_string(),
    })
  })
}

/// Relative path of a finalized release manifest
pub fn manifest_path(name: &str, version: &str) -> PathBuf {
  PathBuf::from("releases")
    .join(name)
    .join(format!("{}-{}.yml", name, version))
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
  #[serde(default)]
  commit_hash: Option<String>,
}

/// The parts of a finalized release manifest release-rail cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseManifest {
  /// Source commit the release was built from
  pub commit_hash: String,
}

impl ReleaseManifest {
  /// Read and parse a manifest file
  pub fn load(path: &Path) -> ReleaseResult<Self> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Self::parse(&bytes, path)
  }

  fn parse(bytes: &[u8], path: &Path) -> ReleaseResult<Self> {
    let document: ManifestDocument = serde_yaml::from_slice(bytes).map_err(|e| {
      ReleaseError::Index(IndexError::Malformed {
        what: path.display().to_string(),
        reason: e.to_string(),
      })
    })?;

    let commit_hash = document.commit_hash.unwrap_or_default();

    if commit_hash.trim().is_empty() {
      return Err(ReleaseError::Index(IndexError::MissingCommitHash {
        path: path.to_path_buf(),
      }));
    }

    Ok(Self {
      commit_hash: commit_hash.trim().to_string(),
    })
  }
}

/// Write `config/private.yml`; does nothing without private configuration
pub fn write_private_config(
  repo_root: &Path,
  private_config: Option<&BTreeMap<String, serde_json::Value>>,
) -> ReleaseResult<()> {
  let Some(private_config) = private_config else {
    return Ok(());
  };

  let yaml = serde_yaml::to_string(private_config).context("marshalling private.yml")?;
  let dir = repo_root.join("config");
  fs::create_dir_all(&dir).context("writing private.yml")?;

  let path = dir.join("private.yml");
  fs::write(&path, yaml).context("writing private.yml")?;
  restrict_permissions(&path)?;
  exclude_from_git(repo_root)?;

  tracing::debug!(path = %path.display(), "wrote private config");
  Ok(())
}

/// Keep private.yml out of `git add -A` in working copies we commit from
fn exclude_from_git(repo_root: &Path) -> ReleaseResult<()> {
  const PATTERN: &str = "/config/private.yml";

  let git_dir = repo_root.join(".git");
  if !git_dir.is_dir() {
    return Ok(());
  }

  let info = git_dir.join("info");
  let exclude = info.join("exclude");
  let existing = fs::read_to_string(&exclude).unwrap_or_default();
  if existing.lines().any(|line| line.trim() == PATTERN) {
    return Ok(());
  }

  fs::create_dir_all(&info).context("excluding private.yml")?;
  let mut content = existing;
  if !content.is_empty() && !content.ends_with('\n') {
    content.push('\n');
  }
  content.push_str(PATTERN);
  content.push('\n');
  fs::write(&exclude, content).context("excluding private.yml")
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> ReleaseResult<()> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(0o600)).context("writing private.yml")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> ReleaseResult<()> {
  Ok(())
}
