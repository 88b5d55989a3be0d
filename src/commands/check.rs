//! `release-rail check`: which versions should a pipeline consider

use crate::commands::pull_source;
use crate::core::config::SourceConfig;
use crate::core::error::{ReleaseResult, ResultExt};
use crate::release::Release;
use crate::release::version::{ReleaseVersion, VersionConstraint};
use serde::Serialize;

/// One emitted version, shaped for JSON consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRef {
  pub version: String,
}

/// Versions to report given an optional prior version, highest first
///
/// Without a prior version only the single latest version is returned.
pub fn check_versions(release: &Release<'_>, source: &SourceConfig, prior: Option<&str>) -> ReleaseResult<Vec<String>> {
  let prior = prior.map(str::trim).filter(|p| !p.is_empty());
  let name = release.name(source.name.as_deref())?;

  let listed = if source.dev_releases {
    let since = match prior {
      Some(raw) => ReleaseVersion::parse(raw)
        .context("parsing version")?
        .dev_commit()
        .map(str::to_string),
      None => None,
    };
    tracing::debug!(name = %name, since = ?since, "listing dev versions");
    release.dev_versions(&name, since.as_deref())
  } else {
    let mut constraints = Vec::new();
    if let Some(constraint) = source.constraint()? {
      constraints.push(constraint);
    }
    if let Some(raw) = prior {
      let prior = ReleaseVersion::parse(raw).context("parsing version")?;
      constraints.push(VersionConstraint::greater_than(&prior));
    }
    let always_include = if source.include_prior { prior } else { None };
    tracing::debug!(name = %name, constraints = constraints.len(), "listing final versions");
    release.versions(&name, &constraints, always_include)
  };
  let versions = listed.context("listing versions")?;

  let mut raws: Vec<String> = versions.iter().map(|v| v.raw().to_string()).collect();
  if prior.is_none() {
    raws.truncate(1);
  }
  Ok(raws)
}

/// Run the check command
pub fn run_check(source: &SourceConfig, prior: Option<&str>, json: bool) -> ReleaseResult<()> {
  let sync = pull_source(source)?;
  let release = Release::new(&sync, source.private_config.as_ref());

  let versions = check_versions(&release, source, prior)?;
  tracing::info!(count = versions.len(), "versions found");

  if json {
    let refs: Vec<VersionRef> = versions.into_iter().map(|version| VersionRef { version }).collect();
    println!("{}", serde_json::to_string_pretty(&refs)?);
  } else {
    for version in versions {
      println!("{}", version);
    }
  }

  Ok(())
}
