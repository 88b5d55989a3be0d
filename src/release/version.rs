//! Release versions and version constraints
//!
//! Final versions are read verbatim from a committed index and keep their
//! original spelling (`262.3` stays `262.3` even though it is compared as
//! `262.3.0`). Dev versions are synthesized from a commit and carry it in
//! their prerelease: `dev.<YYYYMMDDTHHMMSSZ>.commit.<short hash>`. The literal
//! `commit` is always the third identifier and the hash the fourth; that
//! layout is how a dev version is traced back to the commit it came from.

use crate::core::error::{ConfigError, IndexError, ReleaseError, ReleaseResult};
use crate::core::vcs::Commit;
use semver::{BuildMetadata, Comparator, Op, Prerelease, Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;

/// Prerelease identifier marking a dev version's commit slot
const COMMIT_MARKER: &str = "commit";

/// Timestamp layout inside dev prereleases
const DEV_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A parsed version that remembers how it was written
#[derive(Debug, Clone)]
pub struct ReleaseVersion {
  raw: String,
  version: Version,
}

impl ReleaseVersion {
  /// Parse a version, accepting a leading `v` and missing minor/patch parts
  pub fn parse(raw: &str) -> ReleaseResult<Self> {
    let version = parse_lenient(raw).map_err(|reason| {
      ReleaseError::Index(IndexError::BadVersion {
        raw: raw.to_string(),
        reason,
      })
    })?;

    Ok(Self {
      raw: raw.to_string(),
      version,
    })
  }

  /// The version exactly as it was written
  pub fn raw(&self) -> &str {
    &self.raw
  }

  pub fn version(&self) -> &Version {
    &self.version
  }

  /// The commit a dev version was synthesized from
  ///
  /// None for anything that does not carry the `commit` marker in the third
  /// prerelease identifier.
  pub fn dev_commit(&self) -> Option<&str> {
    let mut identifiers = self.version.pre.as_str().split('.');
    let marker = identifiers.nth(2)?;
    let hash = identifiers.next()?;
    (marker == COMMIT_MARKER && !hash.is_empty()).then_some(hash)
  }

  /// The dev version for `commit` built on top of this version
  ///
  /// The patch is bumped (or, when this version is itself a prerelease, the
  /// prerelease is dropped) and the commit time and hash become the new
  /// prerelease.
  pub fn dev_successor(&self, commit: &Commit) -> ReleaseResult<Self> {
    let mut next = self.version.clone();
    if next.pre.is_empty() && next.build.is_empty() {
      next.patch += 1;
    }
    next.build = BuildMetadata::EMPTY;

    let pre = format!(
      "dev.{}.{}.{}",
      commit.timestamp.format(DEV_TIMESTAMP_FORMAT),
      COMMIT_MARKER,
      commit.short_hash
    );
    next.pre = Prerelease::new(&pre).map_err(|e| {
      ReleaseError::Index(IndexError::BadVersion {
        raw: format!("{}-{}", next, pre),
        reason: e.to_string(),
      })
    })?;

    Ok(Self {
      raw: next.to_string(),
      version: next,
    })
  }
}

impl fmt::Display for ReleaseVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

impl PartialEq for ReleaseVersion {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for ReleaseVersion {}

impl PartialOrd for ReleaseVersion {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for ReleaseVersion {
  /// Semver precedence, with the spelling as a tie-breaker for `1.2` vs `1.2.0`
  fn cmp(&self, other: &Self) -> Ordering {
    self.version.cmp(&other.version).then_with(|| self.raw.cmp(&other.raw))
  }
}

fn parse_lenient(raw: &str) -> Result<Version, String> {
  let trimmed = raw.trim();
  let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

  let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
  let (core, suffix) = trimmed.split_at(split);

  let padded = match core.split('.').count() {
    1 => format!("{}.0.0", core),
    2 => format!("{}.0", core),
    _ => core.to_string(),
  };

  Version::parse(&format!("{}{}", padded, suffix)).map_err(|e| e.to_string())
}

/// A range expression over versions
///
/// Comma-separated comparators must all match; `||` separates alternatives.
/// A bare version such as `1.2.3` means exactly that version, while wildcards
/// (`1.x`, `1.2.*`) keep their range meaning.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
  expr: String,
  alternatives: Vec<VersionReq>,
}

impl VersionConstraint {
  pub fn parse(expr: &str) -> ReleaseResult<Self> {
    let invalid = |reason: String| {
      ReleaseError::Config(ConfigError::Invalid {
        field: "version".to_string(),
        reason,
      })
    };

    let alternatives = expr
      .split("||")
      .map(|alternative| {
        let normalized = alternative
          .split(',')
          .map(normalize_comparator)
          .collect::<Vec<_>>()
          .join(", ");
        VersionReq::parse(&normalized).map_err(|e| invalid(format!("'{}': {}", alternative.trim(), e)))
      })
      .collect::<ReleaseResult<Vec<_>>>()?;

    Ok(Self {
      expr: expr.trim().to_string(),
      alternatives,
    })
  }

  /// Versions strictly newer than `version`
  pub fn greater_than(version: &ReleaseVersion) -> Self {
    let v = version.version();
    let comparator = Comparator {
      op: Op::Greater,
      major: v.major,
      minor: Some(v.minor),
      patch: Some(v.patch),
      pre: v.pre.clone(),
    };

    Self {
      expr: format!(">{}", version.raw()),
      alternatives: vec![VersionReq {
        comparators: vec![comparator],
      }],
    }
  }

  pub fn matches(&self, version: &ReleaseVersion) -> bool {
    self.alternatives.iter().any(|req| req.matches(version.version()))
  }
}

impl fmt::Display for VersionConstraint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.expr)
  }
}

/// Pin operator-less, wildcard-free comparators to an exact match
fn normalize_comparator(comparator: &str) -> String {
  let comparator = comparator.trim();
  let starts_with_digit = comparator.chars().next().is_some_and(|c| c.is_ascii_digit());
  let has_wildcard = comparator.contains(['x', 'X', '*']);

  if starts_with_digit && !has_wildcard {
    format!("={}", comparator)
  } else {
    comparator.to_string()
  }
}
