//! Checksums for manifests, packages and generated documents.
//!
//! - `ContentHash`: a full lowercase-hex SHA-256 digest
//! - `checksum_of()`: digest of a value's canonical JSON serialization
//! - `hash_directory()`: deterministic digest of a package directory
//! - `hash_bytes()`: digest of arbitrary bytes

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::canonical::Canonical;

/// A 64-character SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl ContentHash {
  /// Parse a recorded checksum document, tolerating surrounding whitespace.
  pub fn from_recorded(document: &str) -> Self {
    Self(document.trim().to_ascii_lowercase())
  }
}

/// Compute the checksum of `value` after canonicalizing a copy of it.
///
/// Two values that differ only in the order of order-insensitive collections
/// produce the same checksum.
pub fn checksum_of<T>(value: &T) -> Result<ContentHash, serde_json::Error>
where
  T: Canonical + Serialize + Clone,
{
  let canonical = value.clone().canonicalize();
  let serialized = serde_json::to_vec(&canonical)?;
  Ok(hash_bytes(&serialized))
}

/// Error during directory hashing.
#[derive(Debug, thiserror::Error)]
pub enum DirHashError {
  #[error("failed to walk directory: {message}")]
  WalkDir { message: String },

  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },
}

/// Compute a deterministic hash of a directory's contents.
///
/// Only relative paths and file bytes participate; timestamps and
/// permissions do not. Entries are visited in file-name order.
pub fn hash_directory(path: &Path) -> Result<ContentHash, DirHashError> {
  let mut hasher = Sha256::new();

  for entry in WalkDir::new(path).sort_by_file_name() {
    let entry = entry.map_err(|e| DirHashError::WalkDir { message: e.to_string() })?;
    let entry_path = entry.path();
    let rel_path = entry_path
      .strip_prefix(path)
      .unwrap_or(entry_path)
      .to_string_lossy()
      .replace('\\', "/");

    if rel_path.is_empty() {
      continue;
    }

    let line = if entry.file_type().is_file() {
      format!("F:{}:{}", rel_path, hash_file(entry_path)?)
    } else if entry.file_type().is_dir() {
      format!("D:{}", rel_path)
    } else {
      continue;
    };

    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, DirHashError> {
  let read_error = |e: std::io::Error| DirHashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  };

  let mut file = fs::File::open(path).map_err(read_error)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_error)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(hex::encode(Sha256::digest(data)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::{Group, GroupMember, SecurityPrincipals};
  use tempfile::tempdir;

  #[test]
  fn bytes_hash_is_full_length_hex() {
    let hash = hash_bytes(b"hello");
    assert_eq!(hash.0.len(), 64);
    assert!(hash.0.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
  }

  #[test]
  fn recorded_checksum_is_normalized() {
    let recorded = ContentHash::from_recorded("  ABCDEF\n");
    assert_eq!(recorded.0, "abcdef");
  }

  #[test]
  fn checksum_ignores_order_insensitive_collections() {
    let group = |name: &str| Group {
      name: name.to_string(),
      membership: vec![
        GroupMember::SystemGroup { name: "Administrators".into() },
        GroupMember::DomainUser { name: "CONTOSO\\alice".into() },
      ],
    };
    let a = SecurityPrincipals {
      groups: vec![group("Readers"), group("Admins")],
      users: vec![],
    };
    let b = SecurityPrincipals {
      groups: vec![group("Admins"), group("Readers")],
      users: vec![],
    };

    assert_eq!(checksum_of(&a).unwrap(), checksum_of(&b).unwrap());
  }

  #[test]
  fn directory_hash_is_deterministic_and_content_sensitive() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.txt"), "content a").unwrap();
    fs::create_dir(temp.path().join("bin")).unwrap();
    fs::write(temp.path().join("bin/app"), "binary").unwrap();

    let first = hash_directory(temp.path()).unwrap();
    assert_eq!(first, hash_directory(temp.path()).unwrap());

    fs::write(temp.path().join("bin/app"), "patched").unwrap();
    assert_ne!(first, hash_directory(temp.path()).unwrap());
  }

  #[test]
  fn same_content_different_structure_different_hash() {
    let flat = tempdir().unwrap();
    fs::write(flat.path().join("file.txt"), "content").unwrap();

    let nested = tempdir().unwrap();
    fs::create_dir(nested.path().join("subdir")).unwrap();
    fs::write(nested.path().join("subdir/file.txt"), "content").unwrap();

    assert_ne!(hash_directory(flat.path()).unwrap(), hash_directory(nested.path()).unwrap());
  }

  #[test]
  fn missing_file_reports_path() {
    let temp = tempdir().unwrap();
    let err = hash_file(&temp.path().join("absent")).unwrap_err();
    assert!(err.to_string().contains("absent"));
  }
}
