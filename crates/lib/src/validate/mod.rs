//! Two-phase manifest validation.
//!
//! Validators run twice over an application:
//!
//! - **type level**, over the fetched [`ApplicationTypeContext`], where any
//!   attribute still holding a `[Name]` parameter token is skipped
//! - **instance level**, over the assembled [`ApplicationInstanceContext`],
//!   where every value is concrete and nothing is skipped
//!
//! Every rule fails fast with a single [`ValidationError`] naming the
//! element, destination, attribute, value and (when known) source file.
//!
//! The set of validators is closed: [`ValidatorRegistry`] lists them and
//! the assembler runs all of them in both phases.

mod application;
mod diagnostics;
mod duplicate;
mod principals;
mod rules;
mod service;

use std::fmt;

use thiserror::Error;

use crate::config::BuilderConfig;
use crate::context::{ApplicationInstanceContext, ApplicationTypeContext};
use crate::error::ErrorKind;

pub use application::ApplicationManifestValidator;
pub(crate) use application::isolation_mode;
pub use diagnostics::DiagnosticsValidator;
pub use duplicate::{CaseSensitivity, DuplicateDetector};
pub use principals::validate_principals;
pub use rules::{AttributeValue, Presence, Rules};
pub use service::ServiceManifestValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
  /// Parameter tokens are still present and are skipped.
  Type,
  /// All values are concrete.
  Instance,
}

/// Options that change type-level rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFlags {
  /// The type was generated from a compose deployment and may use the reserved name prefix.
  pub compose_deployment: bool,
}

/// Where a failing value lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
  pub element: String,
  pub destination: Option<String>,
  pub attribute: String,
  pub file: Option<String>,
}

impl Location {
  pub fn new(element: impl Into<String>, attribute: impl Into<String>) -> Self {
    Self {
      element: element.into(),
      attribute: attribute.into(),
      ..Default::default()
    }
  }

  pub fn destination(mut self, destination: impl Into<String>) -> Self {
    self.destination = Some(destination.into());
    self
  }

  pub fn file(mut self, file: Option<&str>) -> Self {
    self.file = file.map(str::to_string);
    self
  }

  pub fn attribute(&self, attribute: impl Into<String>) -> Self {
    Self {
      attribute: attribute.into(),
      ..self.clone()
    }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.element)?;
    if let Some(destination) = &self.destination {
      write!(f, "/{}", destination)?;
    }
    write!(f, ".{}", self.attribute)?;
    if let Some(file) = &self.file {
      write!(f, " in {}", file)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("{at}: value '{value}' cannot be converted to {target_type}")]
  ValueCannotBeConvert {
    at: Location,
    value: String,
    target_type: &'static str,
  },

  #[error("{at}: value '{value}' must be greater than zero")]
  ValueMustBeGreaterThanZero { at: Location, value: String },

  #[error("{at}: value '{value}' must not be negative")]
  ValueMustNotBeNegative { at: Location, value: String },

  #[error("{at}: value '{value}' is not one of [{valid}]")]
  InvalidEnumValue { at: Location, value: String, valid: String },

  #[error("{at}: absolute path '{value}' is not allowed")]
  AbsolutePathNotAllowed { at: Location, value: String },

  #[error("{at}: path '{value}' must not contain '..' segments")]
  InvalidRelativePath { at: Location, value: String },

  #[error("{at}: '{value}' is not a valid account name (expected DOMAIN\\user or user@domain)")]
  InvalidAccountNameFormat { at: Location, value: String },

  /// An attribute is required or forbidden by the value of another attribute.
  #[error("{at}: attribute is {} when {discriminator} is '{discriminator_value}'", requirement(.required))]
  AttributeInvalid {
    at: Location,
    discriminator: String,
    discriminator_value: String,
    required: bool,
  },

  /// A password attribute is required or forbidden by the account type.
  #[error("{at}: password attribute is {} when {discriminator} is '{discriminator_value}'", requirement(.required))]
  PasswordAttributeInvalid {
    at: Location,
    discriminator: String,
    discriminator_value: String,
    required: bool,
  },

  #[error("{at}: value must not be empty")]
  EmptyValueNotAllowed { at: Location },

  #[error("{at}: '{value}' is not a valid URI")]
  PathNotValidUri { at: Location, value: String },

  #[error("{at}: '{value}' is not a valid version")]
  InvalidVersionFormat { at: Location, value: String },

  #[error("duplicate {element} with {attribute} '{value}'{}", in_file(.file))]
  DuplicateElementFound {
    element: String,
    attribute: String,
    value: String,
    file: Option<String>,
  },

  #[error("{at}: '{value}' is not a valid name: {reason}")]
  InvalidName {
    at: Location,
    value: String,
    reason: &'static str,
  },

  #[error("{at}: '{value}' does not refer to any {target}")]
  InvalidReference {
    at: Location,
    value: String,
    target: &'static str,
  },

  #[error("invalid cluster configuration upgrade from '{current_version}' to '{target_version}': {reason}")]
  InvalidConfigUpgrade {
    current_version: String,
    target_version: String,
    reason: String,
  },
}

fn requirement(required: &bool) -> &'static str {
  if *required { "required" } else { "not allowed" }
}

fn in_file(file: &Option<String>) -> String {
  file.as_ref().map(|f| format!(" in {}", f)).unwrap_or_default()
}

impl ValidationError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ValidationError::ValueCannotBeConvert { .. } => ErrorKind::ValueCannotBeConvert,
      ValidationError::ValueMustBeGreaterThanZero { .. } => ErrorKind::ValueMustBeGreaterThanZero,
      ValidationError::ValueMustNotBeNegative { .. } => ErrorKind::ValueMustNotBeNegative,
      ValidationError::InvalidEnumValue { .. } => ErrorKind::InvalidEnumValue,
      ValidationError::AbsolutePathNotAllowed { .. } => ErrorKind::AbsolutePathNotAllowed,
      ValidationError::InvalidRelativePath { .. } => ErrorKind::InvalidRelativePath,
      ValidationError::InvalidAccountNameFormat { .. } => ErrorKind::InvalidAccountNameFormat,
      ValidationError::AttributeInvalid { .. } => ErrorKind::AttributeInvalid,
      ValidationError::PasswordAttributeInvalid { .. } => ErrorKind::PasswordAttributeInvalid,
      ValidationError::EmptyValueNotAllowed { .. } => ErrorKind::EmptyValueNotAllowed,
      ValidationError::PathNotValidUri { .. } => ErrorKind::PathNotValidUri,
      ValidationError::InvalidVersionFormat { .. } => ErrorKind::InvalidVersionFormat,
      ValidationError::DuplicateElementFound { .. } => ErrorKind::DuplicateElementFound,
      ValidationError::InvalidName { .. } => ErrorKind::InvalidName,
      ValidationError::InvalidReference { .. } => ErrorKind::InvalidReference,
      ValidationError::InvalidConfigUpgrade { .. } => ErrorKind::InvalidConfigUpgrade,
    }
  }
}

/// The two entry points every validator provides.
pub trait Validator: Send + Sync {
  fn name(&self) -> &'static str;

  fn validate_type(&self, context: &ApplicationTypeContext, flags: TypeFlags) -> Result<(), ValidationError>;

  fn validate_instance(&self, context: &ApplicationInstanceContext) -> Result<(), ValidationError>;
}

/// A registered validator.
#[derive(Debug, Clone)]
pub enum RegisteredValidator {
  ApplicationManifest(ApplicationManifestValidator),
  ServiceManifest(ServiceManifestValidator),
  Diagnostics(DiagnosticsValidator),
}

impl RegisteredValidator {
  fn as_validator(&self) -> &dyn Validator {
    match self {
      RegisteredValidator::ApplicationManifest(v) => v,
      RegisteredValidator::ServiceManifest(v) => v,
      RegisteredValidator::Diagnostics(v) => v,
    }
  }
}

/// The ordered list of validators run in both phases.
#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
  validators: Vec<RegisteredValidator>,
}

impl ValidatorRegistry {
  /// Application manifest, service manifest and diagnostics validators, in that order.
  pub fn standard(config: &BuilderConfig) -> Self {
    Self {
      validators: vec![
        RegisteredValidator::ApplicationManifest(ApplicationManifestValidator),
        RegisteredValidator::ServiceManifest(ServiceManifestValidator::new(config.runtime_assemblies.clone())),
        RegisteredValidator::Diagnostics(DiagnosticsValidator),
      ],
    }
  }

  pub fn names(&self) -> Vec<&'static str> {
    self.validators.iter().map(|v| v.as_validator().name()).collect()
  }

  pub fn validate_type(&self, context: &ApplicationTypeContext, flags: TypeFlags) -> Result<(), ValidationError> {
    for validator in &self.validators {
      let validator = validator.as_validator();
      tracing::debug!(validator = validator.name(), "type-level validation");
      validator.validate_type(context, flags)?;
    }
    Ok(())
  }

  pub fn validate_instance(&self, context: &ApplicationInstanceContext) -> Result<(), ValidationError> {
    for validator in &self.validators {
      let validator = validator.as_validator();
      tracing::debug!(validator = validator.name(), "instance-level validation");
      validator.validate_instance(context)?;
    }
    Ok(())
  }
}
