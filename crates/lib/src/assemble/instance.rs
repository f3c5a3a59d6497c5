//! Instance graph construction.
//!
//! Turns a fetched [`ApplicationTypeContext`] plus resolved parameters into
//! the application package, one service package per import and the instance
//! document referencing them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use super::{AssembleError, join_all};
use crate::context::{ApplicationInstanceContext, ApplicationTypeContext, ServiceManifestEntity};
use crate::deadline::Deadline;
use crate::manifest::{
  ApplicationInstance, ApplicationPackage, ContainerHost, DigestedCodePackage, DigestedEndpoint, DigestedEnvironment,
  DigestedPackage, ImportPolicy, ResourceGovernance, RunAs, SecurityAccessPolicy, ServiceManifestImport,
  ServicePackage, ServicePackageContent, ServicePackageRef, SharedPackage,
};
use crate::params::{ApplyParameters, ResolvedParameters};
use crate::store::{ArtifactStore, StoreLayout, get_json};
use crate::util::hash::{ContentHash, checksum_of};
use crate::validate::{Location, ValidationError, isolation_mode};
use crate::version::RolloutVersion;

const DEFAULT_ENTRY_POINT_TYPE: &str = "Main";
const DEFAULT_SHARING_SCOPE: &str = "None";

/// Who the assembled instance belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
  pub application_id: String,
  pub application_name: String,
  pub instance_version: u64,
}

/// Rollout versions of the instance being upgraded, keyed by what decides reuse.
#[derive(Debug, Clone, Default)]
pub(super) struct PreviousRollouts {
  application: Option<(ContentHash, RolloutVersion)>,
  services: BTreeMap<String, ServicePackage>,
}

impl PreviousRollouts {
  /// Fetch the application package and service packages `current` refers to.
  pub(super) async fn fetch(
    store: &Arc<dyn ArtifactStore>,
    current: &ApplicationInstance,
    deadline: Deadline,
  ) -> Result<Self, AssembleError> {
    let type_name = &current.application_type_name;
    let application_id = &current.application_id;

    let package_key = StoreLayout::application_package(type_name, application_id, current.application_package_ref);
    let mut join_set = JoinSet::new();
    for reference in &current.service_package_refs {
      let store = Arc::clone(store);
      let key = StoreLayout::service_package(type_name, application_id, &reference.name, reference.rollout_version);
      join_set.spawn(async move { Ok::<_, AssembleError>(get_json::<ServicePackage>(store.as_ref(), &key, deadline).await?) });
    }

    let application: ApplicationPackage = get_json(store.as_ref(), &package_key, deadline).await?;
    let services = join_all(join_set, |_| {}).await?;
    Ok(Self {
      application: Some((application.content_checksum, application.rollout_version)),
      services: services.into_iter().map(|sp| (sp.name.clone(), sp)).collect(),
    })
  }

  fn application_rollout(&self, checksum: &ContentHash) -> Option<RolloutVersion> {
    match &self.application {
      Some((previous, rollout)) if previous == checksum => Some(*rollout),
      _ => None,
    }
  }

  /// A service package keeps its rollout version only if it would regenerate byte-identically.
  fn service_rollout(&self, candidate: &ServicePackage) -> Option<RolloutVersion> {
    let previous = self.services.get(&candidate.name)?;
    let unchanged = previous.content_checksum == candidate.content_checksum
      && previous.manifest_version == candidate.manifest_version
      && previous.manifest_checksum == candidate.manifest_checksum;
    unchanged.then_some(previous.rollout_version)
  }
}

pub(super) fn build_instance(
  type_context: &ApplicationTypeContext,
  identity: InstanceIdentity,
  parameters: ResolvedParameters,
  previous: Option<&PreviousRollouts>,
) -> Result<ApplicationInstanceContext, AssembleError> {
  let manifest = &type_context.manifest;
  let fresh = RolloutVersion::for_instance(identity.instance_version);

  let environment = DigestedEnvironment {
    principals: manifest.principals.clone().apply_parameters(&parameters)?,
    policies: manifest.policies.clone().apply_parameters(&parameters)?,
    diagnostics: manifest.diagnostics.clone().apply_parameters(&parameters)?,
  };
  let environment_checksum = checksum(&environment, "application package")?;
  let application_rollout = previous
    .and_then(|p| p.application_rollout(&environment_checksum))
    .unwrap_or(fresh);
  let application_package = ApplicationPackage {
    application_id: identity.application_id.clone(),
    application_name: identity.application_name.clone(),
    application_type_name: manifest.application_type_name.clone(),
    rollout_version: application_rollout,
    content_checksum: environment_checksum,
    environment,
  };

  let mut service_packages = Vec::with_capacity(manifest.service_manifest_imports.len());
  for import in &manifest.service_manifest_imports {
    let reference = &import.service_manifest_ref;
    let entity = type_context
      .service_manifest(&reference.name)
      .ok_or_else(|| ValidationError::InvalidReference {
        at: Location::new("ServiceManifestRef", "ServiceManifestName").file(Some(type_context.source.as_str())),
        value: reference.name.clone(),
        target: "fetched service manifest",
      })?;

    let default_user = application_package
      .environment
      .policies
      .default_run_as
      .as_ref()
      .map(|policy| policy.user_ref.as_str());
    let mut package = build_service_package(entity, import, &parameters, default_user, fresh)?;
    if let Some(rollout) = previous.and_then(|p| p.service_rollout(&package)) {
      package.rollout_version = rollout;
    }
    debug!(
      service_package = %package.name,
      rollout_version = %package.rollout_version,
      checksum = %package.content_checksum,
      "built service package"
    );
    service_packages.push(package);
  }

  let instance = ApplicationInstance {
    application_id: identity.application_id,
    application_name: identity.application_name,
    application_type_name: manifest.application_type_name.clone(),
    application_type_version: manifest.application_type_version.clone(),
    instance_version: identity.instance_version,
    application_package_ref: application_package.rollout_version,
    service_package_refs: service_packages
      .iter()
      .map(|sp| ServicePackageRef {
        name: sp.name.clone(),
        rollout_version: sp.rollout_version,
      })
      .collect(),
    default_services: manifest.default_services.clone().apply_parameters(&parameters)?,
    parameters: parameters.to_map(),
  };

  Ok(ApplicationInstanceContext {
    instance,
    application_package,
    service_packages,
    parameters,
  })
}

fn build_service_package(
  entity: &ServiceManifestEntity,
  import: &ServiceManifestImport,
  parameters: &ResolvedParameters,
  default_user: Option<&str>,
  rollout_version: RolloutVersion,
) -> Result<ServicePackage, AssembleError> {
  let policies = import.policies.clone().apply_parameters(parameters)?;
  let overrides = import.config_overrides.clone().apply_parameters(parameters)?;
  let manifest = &entity.manifest;

  let code_packages = entity
    .code_packages
    .iter()
    .map(|package| {
      let name = package.description.name.as_str();
      DigestedCodePackage {
        package: package.description.clone(),
        checksum: package.checksum.clone(),
        run_as: run_as_policies(&policies, name, default_user),
        container_host: policies.iter().find_map(|policy| match policy {
          ImportPolicy::ContainerHost {
            code_package_ref,
            isolation,
            hostname,
          } if code_package_ref == name => Some(ContainerHost {
            isolation: isolation_mode(isolation.as_deref()),
            hostname: hostname.clone(),
          }),
          _ => None,
        }),
        resource_governance: policies.iter().find_map(|policy| match policy {
          ImportPolicy::ResourceGovernance {
            code_package_ref,
            cpu_shares,
            memory_in_mb,
          } if code_package_ref == name => Some(ResourceGovernance {
            cpu_shares: cpu_shares.clone(),
            memory_in_mb: memory_in_mb.clone(),
          }),
          _ => None,
        }),
        debug_parameters: parameters
          .debug_parameters_for(&manifest.name, name)
          .map(|entry| entry.digest()),
      }
    })
    .collect();

  let config_packages = entity
    .config_packages
    .iter()
    .map(|package| DigestedPackage {
      package: package.description.clone(),
      checksum: package.checksum.clone(),
      setting_overrides: overrides
        .iter()
        .filter(|o| o.name == package.description.name)
        .flat_map(|o| o.settings.iter().cloned())
        .collect(),
    })
    .collect();

  let data_packages = entity
    .data_packages
    .iter()
    .map(|package| DigestedPackage {
      package: package.description.clone(),
      checksum: package.checksum.clone(),
      setting_overrides: Vec::new(),
    })
    .collect();

  let endpoints = manifest
    .endpoints
    .iter()
    .map(|endpoint| DigestedEndpoint {
      endpoint: endpoint.clone(),
      certificate_ref: policies.iter().find_map(|policy| match policy {
        ImportPolicy::EndpointBinding {
          endpoint_ref,
          certificate_ref,
        } if *endpoint_ref == endpoint.name => Some(certificate_ref.clone()),
        _ => None,
      }),
    })
    .collect();

  let mut security_access_policies = Vec::new();
  let mut shared_packages = Vec::new();
  for policy in &policies {
    match policy {
      ImportPolicy::SecurityAccess {
        resource_ref,
        principal_ref,
        grant_rights,
      } => security_access_policies.push(SecurityAccessPolicy {
        resource_ref: resource_ref.clone(),
        principal_ref: principal_ref.clone(),
        grant_rights: grant_rights.clone(),
      }),
      ImportPolicy::PackageSharing { package_ref, scope } => shared_packages.push(SharedPackage {
        package_ref: package_ref.clone(),
        scope: scope.clone().unwrap_or_else(|| DEFAULT_SHARING_SCOPE.to_string()),
      }),
      _ => {}
    }
  }

  let content = ServicePackageContent {
    service_types: manifest.service_types.clone(),
    code_packages,
    config_packages,
    data_packages,
    endpoints,
    security_access_policies,
    shared_packages,
    diagnostics: manifest.diagnostics.clone(),
  };
  let content_checksum = checksum(&content, &manifest.name)?;

  Ok(ServicePackage {
    name: manifest.name.clone(),
    manifest_version: manifest.version.clone(),
    manifest_checksum: entity.checksum.clone(),
    rollout_version,
    content_checksum,
    content,
  })
}

/// The Main identity then the Setup identity of one code package.
///
/// `All` and an unset entry point fill the Main slot. Without a Main policy the
/// application's default user runs Main.
fn run_as_policies(policies: &[ImportPolicy], code_package: &str, default_user: Option<&str>) -> Vec<RunAs> {
  let mut main = None;
  let mut setup = None;
  for policy in policies {
    let ImportPolicy::RunAs {
      code_package_ref,
      user_ref,
      entry_point_type,
    } = policy
    else {
      continue;
    };
    if code_package_ref != code_package {
      continue;
    }
    let entry_point_type = entry_point_type
      .clone()
      .unwrap_or_else(|| DEFAULT_ENTRY_POINT_TYPE.to_string());
    let slot = if entry_point_type.trim().eq_ignore_ascii_case("setup") {
      &mut setup
    } else {
      &mut main
    };
    if slot.is_none() {
      *slot = Some(RunAs {
        user_ref: user_ref.clone(),
        entry_point_type,
      });
    }
  }

  let main = main.or_else(|| {
    default_user.map(|user_ref| RunAs {
      user_ref: user_ref.to_string(),
      entry_point_type: DEFAULT_ENTRY_POINT_TYPE.to_string(),
    })
  });
  main.into_iter().chain(setup).collect()
}

fn checksum<T>(value: &T, item: &str) -> Result<ContentHash, AssembleError>
where
  T: crate::canonical::Canonical + serde::Serialize + Clone,
{
  checksum_of(value).map_err(|source| AssembleError::Checksum {
    item: item.to_string(),
    source,
  })
}
