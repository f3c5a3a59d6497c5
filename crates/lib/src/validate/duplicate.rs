use std::collections::HashSet;
use std::sync::Mutex;

use super::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSensitivity {
  Sensitive,
  Insensitive,
}

/// Accumulates names within one manifest scope and rejects the second occurrence.
///
/// The accumulator is behind a lock so one detector can be shared by
/// concurrent fetch tasks.
#[derive(Debug)]
pub struct DuplicateDetector {
  element: String,
  attribute: String,
  case: CaseSensitivity,
  file: Option<String>,
  seen: Mutex<HashSet<String>>,
}

impl DuplicateDetector {
  pub fn new(element: impl Into<String>, attribute: impl Into<String>, case: CaseSensitivity) -> Self {
    Self {
      element: element.into(),
      attribute: attribute.into(),
      case,
      file: None,
      seen: Mutex::new(HashSet::new()),
    }
  }

  /// Qualify failures with the file the names come from.
  pub fn in_file(mut self, file: impl Into<String>) -> Self {
    self.file = Some(file.into());
    self
  }

  pub fn add(&self, name: &str) -> Result<(), ValidationError> {
    let key = match self.case {
      CaseSensitivity::Sensitive => name.to_string(),
      CaseSensitivity::Insensitive => name.to_lowercase(),
    };

    let inserted = match self.seen.lock() {
      Ok(mut seen) => seen.insert(key),
      Err(poisoned) => poisoned.into_inner().insert(key),
    };

    if inserted {
      Ok(())
    } else {
      Err(ValidationError::DuplicateElementFound {
        element: self.element.clone(),
        attribute: self.attribute.clone(),
        value: name.to_string(),
        file: self.file.clone(),
      })
    }
  }

  /// Add every name, stopping at the first duplicate.
  pub fn add_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), ValidationError> {
    names.into_iter().try_for_each(|name| self.add(name))
  }
}
