use serde::{Deserialize, Serialize};

/// Application-level diagnostics collection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagnostics {
  pub crash_dump_source: Option<DiagnosticSource>,
  pub etw_source: Option<DiagnosticSource>,
  pub folder_sources: Vec<FolderSource>,
}

impl Diagnostics {
  pub fn is_empty(&self) -> bool {
    self.crash_dump_source.is_none() && self.etw_source.is_none() && self.folder_sources.is_empty()
  }
}

/// Crash dump or ETW collection with its upload destinations.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticSource {
  pub is_enabled: Option<String>,
  pub destinations: Destinations,
  pub parameters: Vec<DiagnosticParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderSource {
  pub is_enabled: Option<String>,
  pub relative_folder_path: Option<String>,
  pub data_deletion_age_in_days: Option<String>,
  pub destinations: Destinations,
  pub parameters: Vec<DiagnosticParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct Destinations {
  pub azure_blobs: Vec<AzureBlobDestination>,
  pub file_stores: Vec<FileStoreDestination>,
  pub local_stores: Vec<LocalStoreDestination>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureBlobDestination {
  pub is_enabled: Option<String>,
  pub connection_string: Option<String>,
  pub connection_string_is_encrypted: Option<String>,
  pub container_name: Option<String>,
  pub upload_interval_in_minutes: Option<String>,
  pub data_deletion_age_in_days: Option<String>,
  /// Only meaningful for ETW destinations.
  pub level_filter: Option<String>,
  pub parameters: Vec<DiagnosticParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreDestination {
  pub is_enabled: Option<String>,
  pub path: Option<String>,
  pub upload_interval_in_minutes: Option<String>,
  pub data_deletion_age_in_days: Option<String>,
  pub account_type: Option<String>,
  pub account_name: Option<String>,
  pub password: Option<String>,
  pub password_encrypted: Option<String>,
  /// Only meaningful for ETW destinations.
  pub level_filter: Option<String>,
  pub parameters: Vec<DiagnosticParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStoreDestination {
  pub is_enabled: Option<String>,
  pub relative_folder_path: Option<String>,
  pub data_deletion_age_in_days: Option<String>,
  /// Only meaningful for ETW destinations.
  pub level_filter: Option<String>,
  pub parameters: Vec<DiagnosticParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticParameter {
  pub name: String,
  pub value: String,
}
