//! Version tokens: rollout versions, product versions and cluster versions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
  #[error("'{0}' is not a valid rollout version (expected MAJOR.MINOR)")]
  Rollout(String),

  #[error("'{0}' is not a valid cluster version (expected CODE:CONFIG)")]
  Cluster(String),
}

impl VersionError {
  pub fn kind(&self) -> ErrorKind {
    ErrorKind::InvalidVersionFormat
  }
}

/// Monotonic version stamped on generated packages, independent of the
/// application type version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RolloutVersion {
  pub major: u32,
  pub minor: u32,
}

impl RolloutVersion {
  pub const fn new(major: u32, minor: u32) -> Self {
    Self { major, minor }
  }

  /// Rollout version stamped on packages generated for `instance_version`.
  pub fn for_instance(instance_version: u64) -> Self {
    Self::new(u32::try_from(instance_version).unwrap_or(u32::MAX), 0)
  }
}

impl Default for RolloutVersion {
  fn default() -> Self {
    Self::for_instance(1)
  }
}

impl fmt::Display for RolloutVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.major, self.minor)
  }
}

impl FromStr for RolloutVersion {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let err = || VersionError::Rollout(s.to_string());
    let (major, minor) = s.split_once('.').ok_or_else(err)?;
    Ok(Self {
      major: major.parse().map_err(|_| err())?,
      minor: minor.parse().map_err(|_| err())?,
    })
  }
}

impl TryFrom<String> for RolloutVersion {
  type Error = VersionError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<RolloutVersion> for String {
  fn from(value: RolloutVersion) -> Self {
    value.to_string()
  }
}

/// Parse a product version: one to four dot-separated unsigned integers.
pub fn parse_product_version(value: &str) -> Option<Vec<u32>> {
  let parts: Vec<&str> = value.split('.').collect();
  if parts.is_empty() || parts.len() > 4 {
    return None;
  }
  parts
    .iter()
    .map(|part| {
      if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        None
      } else {
        part.parse::<u32>().ok()
      }
    })
    .collect()
}

/// A cluster version: the runtime code version plus the cluster configuration version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClusterVersion {
  /// No usable version is known; nothing can be compared against it.
  Invalid,
  Known { code: String, config: String },
}

impl ClusterVersion {
  pub const INVALID_TOKEN: &'static str = "Invalid";

  pub fn config(&self) -> Option<&str> {
    match self {
      ClusterVersion::Invalid => None,
      ClusterVersion::Known { config, .. } => Some(config),
    }
  }
}

impl fmt::Display for ClusterVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ClusterVersion::Invalid => write!(f, "{}", Self::INVALID_TOKEN),
      ClusterVersion::Known { code, config } => write!(f, "{}:{}", code, config),
    }
  }
}

impl FromStr for ClusterVersion {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.eq_ignore_ascii_case(Self::INVALID_TOKEN) {
      return Ok(ClusterVersion::Invalid);
    }
    let err = || VersionError::Cluster(s.to_string());
    let (code, config) = s.split_once(':').ok_or_else(err)?;
    if parse_product_version(code).is_none() || config.trim().is_empty() {
      return Err(err());
    }
    Ok(ClusterVersion::Known {
      code: code.to_string(),
      config: config.to_string(),
    })
  }
}
