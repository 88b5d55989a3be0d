use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, ResultExt};
use crate::release::version::VersionConstraint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for release-rail
/// Searched in order: release-rail.toml, .release-rail.toml, .config/release-rail.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RailConfig {
  #[serde(default)]
  pub source: SourceConfig,
  #[serde(default)]
  pub publish: PublishConfig,
}

/// Where the release lives and how its versions are selected
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
  /// Remote URL of the release repository
  #[serde(default)]
  pub repository: Option<String>,

  /// Branch to track (remote default branch when unset)
  #[serde(default)]
  pub branch: Option<String>,

  /// Release name (discovered from config/final.yml when unset)
  #[serde(default)]
  pub name: Option<String>,

  /// Version constraint applied to final versions, e.g. ">=1.0.0, <2.0.0"
  #[serde(default)]
  pub version: Option<String>,

  /// Synthesize dev versions from commits instead of reading the index
  #[serde(default)]
  pub dev_releases: bool,

  /// Emit the prior version itself when it is still present in the index
  #[serde(default)]
  pub include_prior: bool,

  /// Private key material used for clone/pull/push
  #[serde(default)]
  pub private_key: Option<String>,

  /// Opaque key/value data written to config/private.yml before packaging
  #[serde(default)]
  pub private_config: Option<BTreeMap<String, serde_json::Value>>,

  /// Root directory for cached working copies
  #[serde(default)]
  pub cache_dir: Option<PathBuf>,
}

/// Parameters for publishing a finalized release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
  #[serde(default = "default_author_name")]
  pub author_name: String,

  #[serde(default = "default_author_email")]
  pub author_email: String,

  /// Rebase and retry when the push is rejected
  #[serde(default)]
  pub rebase: bool,

  /// Do not create or push the `v<version>` tag
  #[serde(default)]
  pub skip_tag: bool,

  /// External packaging executable
  #[serde(default = "default_tool")]
  pub tool: String,
}

fn default_author_name() -> String {
  "CI Bot".to_string()
}

fn default_author_email() -> String {
  "ci@localhost".to_string()
}

fn default_tool() -> String {
  "bosh".to_string()
}

impl Default for PublishConfig {
  fn default() -> Self {
    Self {
      author_name: default_author_name(),
      author_email: default_author_email(),
      rebase: false,
      skip_tag: false,
      tool: default_tool(),
    }
  }
}

impl SourceConfig {
  /// The configured remote, or a config error
  pub fn repository(&self) -> ReleaseResult<&str> {
    self
      .repository
      .as_deref()
      .filter(|r| !r.is_empty())
      .ok_or_else(|| {
        ReleaseError::Config(ConfigError::MissingField {
          field: "source.repository".to_string(),
        })
      })
  }

  /// The configured branch, or a config error (publishing needs a branch to push to)
  pub fn required_branch(&self) -> ReleaseResult<&str> {
    self.branch.as_deref().filter(|b| !b.is_empty()).ok_or_else(|| {
      ReleaseError::Config(ConfigError::MissingField {
        field: "source.branch".to_string(),
      })
    })
  }

  /// Parse the source version constraint, if any
  pub fn constraint(&self) -> ReleaseResult<Option<VersionConstraint>> {
    match self.version.as_deref() {
      Some(expr) if !expr.trim().is_empty() => Ok(Some(VersionConstraint::parse(expr)?)),
      _ => Ok(None),
    }
  }

  /// Validate source configuration
  pub fn validate(&self) -> ReleaseResult<()> {
    self.repository()?;
    self.constraint()?;
    Ok(())
  }
}

impl RailConfig {
  /// Find config file in search order: release-rail.toml, .release-rail.toml, .config/release-rail.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("release-rail.toml"),
      path.join(".release-rail.toml"),
      path.join(".config").join("release-rail.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from an explicit file, the search path, or defaults when nothing is found
  pub fn load(explicit: Option<&Path>, search_root: &Path) -> ReleaseResult<Self> {
    let config_path = match explicit {
      Some(path) => path.to_path_buf(),
      None => match Self::find_config_path(search_root) {
        Some(path) => path,
        None => return Ok(Self::default()),
      },
    };

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    Self::parse(&content).with_context(|| format!("Failed to parse config from {}", config_path.display()))
  }

  /// Parse config from TOML text
  pub fn parse(content: &str) -> ReleaseResult<Self> {
    let config: RailConfig = toml_edit::de::from_str(content)?;
    Ok(config)
  }
}
