use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
  ApplicationPolicies, DefaultService, Diagnostics, EndpointDescription, PackageDescription, SecurityAccessPolicy,
  SecurityPrincipals, ServiceDiagnostics, ServiceTypeDescription, SettingOverride,
};
use crate::util::hash::ContentHash;
use crate::version::RolloutVersion;

/// A created application: which type it instantiates and which packages it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInstance {
  pub application_id: String,
  pub application_name: String,
  pub application_type_name: String,
  pub application_type_version: String,
  pub instance_version: u64,
  pub application_package_ref: RolloutVersion,
  /// Follows the import order of the application manifest.
  pub service_package_refs: Vec<ServicePackageRef>,
  pub default_services: Vec<DefaultService>,
  /// Resolved parameter values, keyed by declared name.
  pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServicePackageRef {
  pub name: String,
  pub rollout_version: RolloutVersion,
}

/// The application-wide environment shared by every service package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPackage {
  pub application_id: String,
  pub application_name: String,
  pub application_type_name: String,
  pub rollout_version: RolloutVersion,
  /// Checksum of `environment`; independent of `rollout_version`.
  pub content_checksum: ContentHash,
  pub environment: DigestedEnvironment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DigestedEnvironment {
  pub principals: SecurityPrincipals,
  pub policies: ApplicationPolicies,
  pub diagnostics: Diagnostics,
}

/// One imported service manifest with parameters applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePackage {
  pub name: String,
  pub manifest_version: String,
  pub manifest_checksum: ContentHash,
  pub rollout_version: RolloutVersion,
  /// Checksum of `content`; independent of `rollout_version`.
  pub content_checksum: ContentHash,
  pub content: ServicePackageContent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServicePackageContent {
  pub service_types: Vec<ServiceTypeDescription>,
  pub code_packages: Vec<DigestedCodePackage>,
  pub config_packages: Vec<DigestedPackage>,
  pub data_packages: Vec<DigestedPackage>,
  pub endpoints: Vec<DigestedEndpoint>,
  pub security_access_policies: Vec<SecurityAccessPolicy>,
  pub shared_packages: Vec<SharedPackage>,
  pub diagnostics: ServiceDiagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DigestedCodePackage {
  pub package: PackageDescription,
  pub checksum: Option<ContentHash>,
  /// The Main (or All) identity first, then the Setup identity.
  pub run_as: Vec<RunAs>,
  pub container_host: Option<ContainerHost>,
  pub resource_governance: Option<ResourceGovernance>,
  pub debug_parameters: Option<DebugParameters>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunAs {
  pub user_ref: String,
  pub entry_point_type: String,
}

/// Debugger launch settings attached to a code package at create time.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DebugParameters {
  pub entry_point_type: String,
  pub program_exe_path: Option<String>,
  pub arguments: Option<String>,
  pub working_folder: Option<String>,
  pub code_package_link_folder: Option<String>,
  pub lock_file: Option<String>,
  pub debug_parameters_file: Option<String>,
  pub environment_block: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerHost {
  pub isolation: String,
  pub hostname: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceGovernance {
  pub cpu_shares: Option<String>,
  pub memory_in_mb: Option<String>,
}

/// A config or data package; config packages carry their setting overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DigestedPackage {
  pub package: PackageDescription,
  pub checksum: Option<ContentHash>,
  pub setting_overrides: Vec<SettingOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DigestedEndpoint {
  pub endpoint: EndpointDescription,
  pub certificate_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SharedPackage {
  pub package_ref: Option<String>,
  pub scope: String,
}
