//! Error kinds shared by every failure the builder can report.
//!
//! Each module owns its own error enum; [`ErrorKind`] is the flat taxonomy
//! those enums map onto so callers can branch on the kind of failure without
//! matching on module-specific variants or message text.

use std::fmt;

/// Classification of a builder failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  UndeclaredParameter,
  DuplicateParameter,
  ValueCannotBeConvert,
  ValueMustBeGreaterThanZero,
  ValueMustNotBeNegative,
  InvalidEnumValue,
  AbsolutePathNotAllowed,
  InvalidRelativePath,
  InvalidAccountNameFormat,
  /// An attribute is not valid under the current value of its discriminator.
  AttributeInvalid,
  /// A credential attribute is missing or forbidden under the account type.
  PasswordAttributeInvalid,
  EmptyValueNotAllowed,
  PathNotValidUri,
  InvalidVersionFormat,
  DuplicateElementFound,
  /// A name is reserved, empty or contains forbidden characters.
  InvalidName,
  /// An element refers to another element that does not exist.
  InvalidReference,
  /// A recorded checksum disagrees with the content being provisioned.
  ChecksumConflict,
  /// A public operation was called with malformed arguments.
  InvalidArgument,
  /// A spawned task panicked or was aborted.
  TaskFailed,
  DeadlineExceeded,
  StoreReadFailure,
  StoreWriteFailure,
  InvalidConfigUpgrade,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self)
  }
}
