use serde::{Deserialize, Serialize};

use super::{Diagnostics, SecurityPrincipals};

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationManifest {
  pub application_type_name: String,
  pub application_type_version: String,
  pub description: Option<String>,
  pub parameters: Vec<ManifestParameter>,
  /// Import order is significant and is preserved by canonicalization.
  pub service_manifest_imports: Vec<ServiceManifestImport>,
  pub default_services: Vec<DefaultService>,
  pub principals: SecurityPrincipals,
  pub policies: ApplicationPolicies,
  pub diagnostics: Diagnostics,
}

/// A parameter declared by the application manifest with its default value.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestParameter {
  pub name: String,
  pub default_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceManifestImport {
  pub service_manifest_ref: ServiceManifestRef,
  pub config_overrides: Vec<ConfigOverride>,
  pub policies: Vec<ImportPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceManifestRef {
  pub name: String,
  pub version: String,
}

/// Setting overrides applied to one config package of an imported service manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverride {
  pub name: String,
  pub settings: Vec<SettingOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingOverride {
  pub section: String,
  pub parameter: String,
  pub value: String,
}

/// A policy attached to a service manifest import.
///
/// Lists of policies mix kinds; canonical order sorts by [`ImportPolicy::kind_rank`]
/// first and by [`ImportPolicy::reference_key`] within a kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ImportPolicy {
  RunAs {
    code_package_ref: String,
    user_ref: String,
    entry_point_type: Option<String>,
  },
  SecurityAccess {
    resource_ref: String,
    principal_ref: String,
    grant_rights: Option<String>,
  },
  PackageSharing {
    package_ref: Option<String>,
    scope: Option<String>,
  },
  EndpointBinding {
    endpoint_ref: String,
    certificate_ref: String,
  },
  ContainerHost {
    code_package_ref: String,
    isolation: Option<String>,
    hostname: Option<String>,
  },
  ResourceGovernance {
    code_package_ref: String,
    cpu_shares: Option<String>,
    memory_in_mb: Option<String>,
  },
}

impl ImportPolicy {
  /// Sort bucket of this policy kind.
  pub fn kind_rank(&self) -> u8 {
    match self {
      ImportPolicy::RunAs { .. } => 0,
      ImportPolicy::SecurityAccess { .. } => 1,
      ImportPolicy::PackageSharing { .. } => 2,
      ImportPolicy::EndpointBinding { .. } => 3,
      ImportPolicy::ContainerHost { .. } => 4,
      ImportPolicy::ResourceGovernance { .. } => 5,
    }
  }

  /// The element this policy refers to.
  pub fn reference_key(&self) -> &str {
    match self {
      ImportPolicy::RunAs { code_package_ref, .. } => code_package_ref,
      ImportPolicy::SecurityAccess { resource_ref, .. } => resource_ref,
      ImportPolicy::PackageSharing { package_ref, .. } => package_ref.as_deref().unwrap_or(""),
      ImportPolicy::EndpointBinding { endpoint_ref, .. } => endpoint_ref,
      ImportPolicy::ContainerHost { code_package_ref, .. } => code_package_ref,
      ImportPolicy::ResourceGovernance { code_package_ref, .. } => code_package_ref,
    }
  }

  pub fn kind_name(&self) -> &'static str {
    match self {
      ImportPolicy::RunAs { .. } => "RunAsPolicy",
      ImportPolicy::SecurityAccess { .. } => "SecurityAccessPolicy",
      ImportPolicy::PackageSharing { .. } => "PackageSharingPolicy",
      ImportPolicy::EndpointBinding { .. } => "EndpointBindingPolicy",
      ImportPolicy::ContainerHost { .. } => "ContainerHostPolicies",
      ImportPolicy::ResourceGovernance { .. } => "ResourceGovernancePolicy",
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceKind {
  #[default]
  Stateless,
  Stateful,
}

/// A service created together with every new application instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultService {
  pub name: String,
  pub service_type_name: String,
  pub kind: ServiceKind,
  pub instance_count: Option<String>,
  pub target_replica_set_size: Option<String>,
  pub min_replica_set_size: Option<String>,
  pub partition_count: Option<String>,
  pub service_package_activation_mode: Option<String>,
  pub placement_constraints: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationPolicies {
  pub default_run_as: Option<DefaultRunAsPolicy>,
  pub security_access_policies: Vec<SecurityAccessPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultRunAsPolicy {
  pub user_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityAccessPolicy {
  pub resource_ref: String,
  pub principal_ref: String,
  pub grant_rights: Option<String>,
}
