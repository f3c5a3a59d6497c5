//! Rule primitives shared by every validator.
//!
//! Each primitive first asks [`Rules::should_validate`]: at type level a value
//! that is still a parameter token is skipped (the primitive returns
//! `Ok(None)`), at instance level every value is checked.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::{Location, ValidationError, ValidationMode};
use crate::params::is_parameter_token;
use crate::version::parse_product_version;

/// `DOMAIN\user` or `user@domain`.
static ACCOUNT_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  // Constant pattern; compiled by `account_name_pattern_compiles`.
  Regex::new(r"^(?:[^\\/@\s]+\\[^\\/@\s]+|[^\\/@\s]+@[^\\/@\s]+)$").expect("account name regex is valid")
});

/// A typed attribute value parsed from its string form.
pub trait AttributeValue: Sized {
  const TYPE_NAME: &'static str;

  fn parse_attribute(value: &str) -> Option<Self>;
}

impl AttributeValue for bool {
  const TYPE_NAME: &'static str = "Boolean";

  fn parse_attribute(value: &str) -> Option<Self> {
    match value.trim().to_ascii_lowercase().as_str() {
      "true" => Some(true),
      "false" => Some(false),
      _ => None,
    }
  }
}

macro_rules! integer_attribute {
  ($($ty:ty => $name:literal),* $(,)?) => {
    $(
      impl AttributeValue for $ty {
        const TYPE_NAME: &'static str = $name;

        fn parse_attribute(value: &str) -> Option<Self> {
          value.trim().parse().ok()
        }
      }
    )*
  };
}

integer_attribute!(i32 => "Int32", i64 => "Int64", u32 => "UInt32", u64 => "UInt64");

/// Whether a credential-like attribute must be present or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
  Required,
  Forbidden,
}

/// Rule evaluator bound to one validation mode and, optionally, one source file.
#[derive(Debug, Clone, Copy)]
pub struct Rules<'a> {
  mode: ValidationMode,
  file: Option<&'a str>,
}

impl<'a> Rules<'a> {
  pub fn new(mode: ValidationMode, file: Option<&'a str>) -> Self {
    Self { mode, file }
  }

  pub fn mode(&self) -> ValidationMode {
    self.mode
  }

  pub fn file(&self) -> Option<&'a str> {
    self.file
  }

  /// A location in this evaluator's file.
  pub fn at(&self, element: &str, attribute: &str) -> Location {
    Location::new(element, attribute).file(self.file)
  }

  pub fn should_validate(&self, value: &str) -> bool {
    self.mode == ValidationMode::Instance || !is_parameter_token(value)
  }

  pub fn convert<T: AttributeValue>(&self, at: &Location, value: &str) -> Result<Option<T>, ValidationError> {
    if !self.should_validate(value) {
      return Ok(None);
    }
    T::parse_attribute(value)
      .map(Some)
      .ok_or_else(|| ValidationError::ValueCannotBeConvert {
        at: at.clone(),
        value: value.to_string(),
        target_type: T::TYPE_NAME,
      })
  }

  pub fn boolean(&self, at: &Location, value: Option<&str>) -> Result<Option<bool>, ValidationError> {
    match value {
      Some(value) => self.convert::<bool>(at, value),
      None => Ok(None),
    }
  }

  pub fn positive_integer(&self, at: &Location, value: &str) -> Result<Option<u64>, ValidationError> {
    let Some(number) = self.convert::<i64>(at, value)? else {
      return Ok(None);
    };
    if number <= 0 {
      return Err(ValidationError::ValueMustBeGreaterThanZero {
        at: at.clone(),
        value: value.to_string(),
      });
    }
    Ok(Some(number as u64))
  }

  pub fn non_negative_integer(&self, at: &Location, value: &str) -> Result<Option<u64>, ValidationError> {
    let Some(number) = self.convert::<i64>(at, value)? else {
      return Ok(None);
    };
    if number < 0 {
      return Err(ValidationError::ValueMustNotBeNegative {
        at: at.clone(),
        value: value.to_string(),
      });
    }
    Ok(Some(number as u64))
  }

  /// Case-insensitive membership; returns the matching symbol as declared in `valid`.
  pub fn enum_member(
    &self,
    at: &Location,
    value: &str,
    valid: &[&'static str],
  ) -> Result<Option<&'static str>, ValidationError> {
    if !self.should_validate(value) {
      return Ok(None);
    }
    valid
      .iter()
      .find(|symbol| symbol.eq_ignore_ascii_case(value.trim()))
      .copied()
      .map(Some)
      .ok_or_else(|| ValidationError::InvalidEnumValue {
        at: at.clone(),
        value: value.to_string(),
        valid: valid.join(", "),
      })
  }

  /// A path relative to some root that never escapes it.
  pub fn relative_path(&self, at: &Location, value: &str) -> Result<(), ValidationError> {
    if !self.should_validate(value) {
      return Ok(());
    }
    if is_absolute(value) {
      return Err(ValidationError::AbsolutePathNotAllowed {
        at: at.clone(),
        value: value.to_string(),
      });
    }
    if value.rsplit(['/', '\\']).any(|segment| segment == "..") {
      return Err(ValidationError::InvalidRelativePath {
        at: at.clone(),
        value: value.to_string(),
      });
    }
    Ok(())
  }

  pub fn account_name(&self, at: &Location, value: &str) -> Result<(), ValidationError> {
    if !self.should_validate(value) || ACCOUNT_NAME_REGEX.is_match(value) {
      return Ok(());
    }
    Err(ValidationError::InvalidAccountNameFormat {
      at: at.clone(),
      value: value.to_string(),
    })
  }

  pub fn uri(&self, at: &Location, value: &str) -> Result<(), ValidationError> {
    if !self.should_validate(value) || Url::parse(value).is_ok() {
      return Ok(());
    }
    Err(ValidationError::PathNotValidUri {
      at: at.clone(),
      value: value.to_string(),
    })
  }

  pub fn version(&self, at: &Location, value: &str) -> Result<(), ValidationError> {
    if !self.should_validate(value) || parse_product_version(value).is_some() {
      return Ok(());
    }
    Err(ValidationError::InvalidVersionFormat {
      at: at.clone(),
      value: value.to_string(),
    })
  }

  /// An identifier usable as a store path segment.
  pub fn name<'v>(&self, at: &Location, value: &'v str) -> Result<&'v str, ValidationError> {
    let value = self.not_empty(at, Some(value))?;
    if !self.should_validate(value) {
      return Ok(value);
    }
    let reason = if value.contains(['/', '\\']) {
      Some("path separators are not allowed")
    } else if value.contains("..") {
      Some("'..' is not allowed")
    } else if value.chars().any(char::is_control) {
      Some("control characters are not allowed")
    } else {
      None
    };
    match reason {
      Some(reason) => Err(ValidationError::InvalidName {
        at: at.clone(),
        value: value.to_string(),
        reason,
      }),
      None => Ok(value),
    }
  }

  /// The attribute must be present and not blank.
  pub fn not_empty<'v>(&self, at: &Location, value: Option<&'v str>) -> Result<&'v str, ValidationError> {
    match value {
      Some(v) if !v.trim().is_empty() => Ok(v),
      _ => Err(ValidationError::EmptyValueNotAllowed { at: at.clone() }),
    }
  }

  /// Enforce an attribute's presence under a discriminator value.
  pub fn exclusive(
    &self,
    at: &Location,
    value: Option<&str>,
    presence: Presence,
    discriminator: (&str, &str),
  ) -> Result<(), ValidationError> {
    if presence_matches(value, presence) {
      return Ok(());
    }
    Err(ValidationError::AttributeInvalid {
      at: at.clone(),
      discriminator: discriminator.0.to_string(),
      discriminator_value: discriminator.1.to_string(),
      required: presence == Presence::Required,
    })
  }

  /// Like [`Rules::exclusive`] for password attributes.
  pub fn password_exclusive(
    &self,
    at: &Location,
    value: Option<&str>,
    presence: Presence,
    discriminator: (&str, &str),
  ) -> Result<(), ValidationError> {
    if presence_matches(value, presence) {
      return Ok(());
    }
    Err(ValidationError::PasswordAttributeInvalid {
      at: at.clone(),
      discriminator: discriminator.0.to_string(),
      discriminator_value: discriminator.1.to_string(),
      required: presence == Presence::Required,
    })
  }
}

fn presence_matches(value: Option<&str>, presence: Presence) -> bool {
  let present = value.is_some_and(|v| !v.is_empty());
  match presence {
    Presence::Required => present,
    Presence::Forbidden => !present,
  }
}

fn is_absolute(value: &str) -> bool {
  let bytes = value.as_bytes();
  let drive_letter = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
  value.starts_with('/') || value.starts_with('\\') || drive_letter
}
