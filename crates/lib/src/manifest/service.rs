use serde::{Deserialize, Serialize};

use super::ServiceKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceManifest {
  pub name: String,
  pub version: String,
  pub description: Option<String>,
  pub service_types: Vec<ServiceTypeDescription>,
  pub code_packages: Vec<PackageDescription>,
  pub config_packages: Vec<PackageDescription>,
  pub data_packages: Vec<PackageDescription>,
  pub endpoints: Vec<EndpointDescription>,
  pub diagnostics: ServiceDiagnostics,
}

impl ServiceManifest {
  /// Every package of the manifest, tagged with its kind.
  pub fn packages(&self) -> impl Iterator<Item = (PackageKind, &PackageDescription)> {
    self
      .code_packages
      .iter()
      .map(|p| (PackageKind::Code, p))
      .chain(self.config_packages.iter().map(|p| (PackageKind::Config, p)))
      .chain(self.data_packages.iter().map(|p| (PackageKind::Data, p)))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceTypeDescription {
  pub service_type_name: String,
  pub kind: ServiceKind,
  pub has_persisted_state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PackageKind {
  Code,
  Config,
  Data,
}

impl PackageKind {
  pub fn element_name(self) -> &'static str {
    match self {
      PackageKind::Code => "CodePackage",
      PackageKind::Config => "ConfigPackage",
      PackageKind::Data => "DataPackage",
    }
  }
}

/// Descriptor shared by code, config and data packages.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageDescription {
  pub name: String,
  pub version: String,
  /// Program started by a code package; unused for config and data packages.
  pub entry_point: Option<String>,
  pub is_shared: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointDescription {
  pub name: String,
  pub protocol: Option<String>,
  pub port: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDiagnostics {
  pub etw: Option<EtwDiagnostics>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct EtwDiagnostics {
  pub provider_guids: Vec<String>,
  pub manifest_data_packages: Vec<PackageDescription>,
}
