//! Parameter resolution and substitution.
//!
//! An application manifest declares parameters with default values; callers
//! supply overrides when creating an instance. [`resolve`] merges the two into
//! a [`ResolvedParameters`] mapping and [`substitute`] replaces whole-value
//! `[Name]` tokens in manifest attributes with resolved values.
//!
//! Parameter names are case-insensitive everywhere. The reserved
//! `_WFDebugParams_` key needs no declaration; its value is parsed into
//! per-code-package debug settings (see [`debug`]).

pub mod debug;
mod substitute;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::consts::DEBUG_PARAMETERS_KEY;
use crate::error::ErrorKind;
use crate::manifest::ManifestParameter;

pub use debug::CodePackageDebugParameters;
pub use substitute::{ApplyParameters, substitute, substitute_opt};

/// Caller-supplied overrides in the order they were given.
pub type ParameterOverrides = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
  /// An override names a parameter the application type does not declare.
  #[error("parameter '{name}' is not declared by the application type")]
  Undeclared { name: String },

  /// A manifest attribute refers to a parameter that has no resolved value.
  #[error("value '{token}' refers to a parameter that is not declared by the application type")]
  UnresolvedReference { token: String },

  /// The same name was supplied or declared twice (case-insensitive).
  #[error("parameter '{name}' is specified more than once{}", origin_suffix(.declared))]
  Duplicate { name: String, declared: bool },

  #[error("value of parameter '{name}' is malformed: {reason}")]
  InvalidValue { name: String, reason: String },
}

fn origin_suffix(declared: &bool) -> &'static str {
  if *declared { " in the application manifest" } else { "" }
}

impl ParameterError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ParameterError::Undeclared { .. } | ParameterError::UnresolvedReference { .. } => ErrorKind::UndeclaredParameter,
      ParameterError::Duplicate { .. } => ErrorKind::DuplicateParameter,
      ParameterError::InvalidValue { .. } => ErrorKind::ValueCannotBeConvert,
    }
  }
}

/// Whether `value` is an unresolved `[Name]` parameter token.
pub fn is_parameter_token(value: &str) -> bool {
  value.len() > 2 && value.starts_with('[') && value.ends_with(']')
}

/// The parameter name inside a `[Name]` token.
pub fn token_name(value: &str) -> Option<&str> {
  if is_parameter_token(value) {
    Some(&value[1..value.len() - 1])
  } else {
    None
  }
}

/// Name to value mapping with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedParameters {
  /// Lowercased name to (name as first spelled, value).
  entries: BTreeMap<String, (String, String)>,
  debug: Vec<CodePackageDebugParameters>,
}

impl ResolvedParameters {
  pub fn get(&self, name: &str) -> Option<&str> {
    self.entries.get(&name.to_lowercase()).map(|(_, value)| value.as_str())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.contains_key(&name.to_lowercase())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Entries ordered by lowercased name.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.values().map(|(name, value)| (name.as_str(), value.as_str()))
  }

  /// Debug settings for one code package; the last matching entry wins.
  pub fn debug_parameters_for(&self, service_manifest: &str, code_package: &str) -> Option<&CodePackageDebugParameters> {
    self
      .debug
      .iter()
      .rev()
      .find(|entry| entry.applies_to(service_manifest, code_package))
  }

  pub fn to_map(&self) -> BTreeMap<String, String> {
    self.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  fn insert(&mut self, name: &str, value: &str) -> bool {
    let key = name.to_lowercase();
    if self.entries.contains_key(&key) {
      return false;
    }
    self.entries.insert(key, (name.to_string(), value.to_string()));
    true
  }
}

/// Merge user overrides with declared defaults.
///
/// Every override must name a declared parameter or the reserved debug key,
/// and no override may repeat a name. Declared defaults fill in every name the
/// caller did not supply.
pub fn resolve(
  overrides: &[(String, String)],
  declared: &[ManifestParameter],
) -> Result<ResolvedParameters, ParameterError> {
  let mut defaults = ResolvedParameters::default();
  for parameter in declared {
    if !defaults.insert(&parameter.name, &parameter.default_value) {
      return Err(ParameterError::Duplicate {
        name: parameter.name.clone(),
        declared: true,
      });
    }
  }

  for (name, _) in overrides {
    if !defaults.contains(name) && !name.eq_ignore_ascii_case(DEBUG_PARAMETERS_KEY) {
      return Err(ParameterError::Undeclared { name: name.clone() });
    }
  }

  let mut resolved = ResolvedParameters::default();
  for (name, value) in overrides {
    if !resolved.insert(name, value) {
      return Err(ParameterError::Duplicate {
        name: name.clone(),
        declared: false,
      });
    }
  }

  for (name, value) in defaults.iter() {
    if resolved.insert(name, value) {
      debug!(parameter = name, "using declared default");
    }
  }

  if let Some(value) = resolved.get(DEBUG_PARAMETERS_KEY) {
    resolved.debug = debug::parse_debug_parameters(value)?;
    debug!(entries = resolved.debug.len(), "debug parameters supplied");
  }

  Ok(resolved)
}
