//! Process-wide builder configuration.
//!
//! [`BuilderConfig`] is built once at startup and passed by reference to
//! whatever needs it. Only the store root and the default timeout can be
//! overridden from the environment.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::consts::{APP_NAME, DEFAULT_TIMEOUT_SECS, STORE_ENV_VAR, TIMEOUT_ENV_VAR};
use crate::error::ErrorKind;
use crate::upgrade::SettingsCatalog;

/// Runtime binaries a code package may never ship.
const RUNTIME_ASSEMBLIES: &[&str] = &[
  "System.Fabric.dll",
  "System.Fabric.Strings.dll",
  "System.Fabric.Management.dll",
  "System.Fabric.Management.ServiceModel.dll",
  "Microsoft.ServiceFabric.Internal.dll",
  "Microsoft.ServiceFabric.Internal.Strings.dll",
  "FabricCommon.dll",
  "FabricClient.dll",
  "FabricRuntime.dll",
  "libFabricCommon.so",
  "libFabricClient.so",
  "libFabricRuntime.so",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("{var} is set but empty")]
  Empty { var: &'static str },

  #[error("{var}='{value}' is not a positive number of seconds")]
  InvalidTimeout { var: &'static str, value: String },
}

impl ConfigError {
  pub fn kind(&self) -> ErrorKind {
    ErrorKind::InvalidArgument
  }
}

#[derive(Debug, Clone)]
pub struct BuilderConfig {
  /// Root directory of the file-system store.
  pub store_root: PathBuf,
  /// Budget for operations whose caller does not supply one.
  pub default_timeout: Duration,
  pub runtime_assemblies: BTreeSet<String>,
  pub settings_catalog: SettingsCatalog,
}

impl Default for BuilderConfig {
  fn default() -> Self {
    Self {
      store_root: default_store_root(),
      default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
      runtime_assemblies: RUNTIME_ASSEMBLIES.iter().map(|a| a.to_string()).collect(),
      settings_catalog: SettingsCatalog::builtin(),
    }
  }
}

impl BuilderConfig {
  /// Defaults with `IMAGEBUILDER_STORE` and `IMAGEBUILDER_TIMEOUT_SECS` applied.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut config = Self::default();
    if let Some(root) = env_override(STORE_ENV_VAR)? {
      config.store_root = PathBuf::from(root);
    }
    if let Some(secs) = env_override(TIMEOUT_ENV_VAR)? {
      config.default_timeout = parse_timeout(TIMEOUT_ENV_VAR, &secs)?;
    }
    Ok(config)
  }

  pub fn with_store_root(mut self, root: impl Into<PathBuf>) -> Self {
    self.store_root = root.into();
    self
  }

  pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
    self.default_timeout = timeout;
    self
  }
}

fn env_override(var: &'static str) -> Result<Option<String>, ConfigError> {
  match std::env::var(var) {
    Ok(value) if value.trim().is_empty() => Err(ConfigError::Empty { var }),
    Ok(value) => Ok(Some(value)),
    Err(_) => Ok(None),
  }
}

fn parse_timeout(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
  match value.trim().parse::<u64>() {
    Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
    _ => Err(ConfigError::InvalidTimeout {
      var,
      value: value.to_string(),
    }),
  }
}

pub fn default_store_root() -> PathBuf {
  data_dir().join("store")
}

/// Per-user data directory for the builder.
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  std::env::var("LOCALAPPDATA")
    .or_else(|_| std::env::var("APPDATA"))
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
    .join(APP_NAME)
}

/// Per-user data directory for the builder.
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  let data_home = std::env::var("XDG_DATA_HOME").map(PathBuf::from).unwrap_or_else(|_| {
    std::env::var("HOME")
      .map(|home| PathBuf::from(home).join(".local").join("share"))
      .unwrap_or_else(|_| PathBuf::from("."))
  });
  data_home.join(APP_NAME)
}
