//! Application manifest rules: identity, parameters, imports, policies,
//! default services and security principals.

use std::collections::HashSet;

use super::rules::Presence;
use super::{
  CaseSensitivity, DuplicateDetector, Rules, TypeFlags, ValidationError, ValidationMode, Validator,
  validate_principals,
};
use crate::consts::COMPOSE_TYPE_PREFIX;
use crate::context::{ApplicationInstanceContext, ApplicationTypeContext, ServiceManifestEntity};
use crate::manifest::{
  ApplicationPolicies, DefaultService, ImportPolicy, PackageKind, SecurityPrincipals, ServiceKind,
  ServiceManifestImport, ServicePackageContent,
};

pub(crate) const ENTRY_POINT_TYPES: &[&str] = &["Setup", "Main", "All"];
pub(crate) const GRANT_RIGHTS: &[&str] = &["Read", "Change", "Full"];
pub(crate) const SHARING_SCOPES: &[&str] = &["None", "All", "Code", "Config", "Data"];
pub(crate) const ISOLATION_MODES: &[&str] = &["process", "hyperv"];
const ACTIVATION_MODES: &[&str] = &["SharedProcess", "ExclusiveProcess"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationManifestValidator;

impl Validator for ApplicationManifestValidator {
  fn name(&self) -> &'static str {
    "ApplicationManifestValidator"
  }

  fn validate_type(&self, context: &ApplicationTypeContext, flags: TypeFlags) -> Result<(), ValidationError> {
    let rules = Rules::new(ValidationMode::Type, Some(context.source.as_str()));
    let manifest = &context.manifest;

    let type_name = rules.name(
      &rules.at("ApplicationManifest", "ApplicationTypeName"),
      &manifest.application_type_name,
    )?;
    if !flags.compose_deployment && type_name.starts_with(COMPOSE_TYPE_PREFIX) {
      return Err(ValidationError::InvalidName {
        at: rules.at("ApplicationManifest", "ApplicationTypeName"),
        value: type_name.to_string(),
        reason: "the prefix is reserved for compose deployments",
      });
    }
    rules.not_empty(
      &rules.at("ApplicationManifest", "ApplicationTypeVersion"),
      Some(manifest.application_type_version.as_str()),
    )?;

    let parameters = file_detector(&rules, "Parameter", CaseSensitivity::Insensitive);
    for parameter in &manifest.parameters {
      rules.not_empty(&rules.at("Parameter", "Name"), Some(parameter.name.as_str()))?;
      parameters.add(&parameter.name)?;
    }

    let imports = file_detector(&rules, "ServiceManifestImport", CaseSensitivity::Insensitive);
    for import in &manifest.service_manifest_imports {
      let reference = &import.service_manifest_ref;
      imports.add(&reference.name)?;
      let entity = context
        .service_manifest(&reference.name)
        .filter(|sm| sm.manifest.version == reference.version)
        .ok_or_else(|| ValidationError::InvalidReference {
          at: rules.at("ServiceManifestRef", "ServiceManifestName"),
          value: format!("{}@{}", reference.name, reference.version),
          target: "fetched service manifest",
        })?;
      validate_import(&rules, import, entity, &manifest.principals)?;
    }

    let service_types: HashSet<&str> = context
      .service_manifests
      .iter()
      .flat_map(|sm| sm.manifest.service_types.iter())
      .map(|t| t.service_type_name.as_str())
      .collect();
    validate_default_services(&rules, &manifest.default_services, &service_types)?;
    validate_principals(&rules, &manifest.principals)?;
    validate_application_policies(&rules, &manifest.policies, &manifest.principals)
  }

  fn validate_instance(&self, context: &ApplicationInstanceContext) -> Result<(), ValidationError> {
    let rules = Rules::new(ValidationMode::Instance, None);
    let environment = &context.application_package.environment;

    let service_types: HashSet<&str> = context
      .service_packages
      .iter()
      .flat_map(|sp| sp.content.service_types.iter())
      .map(|t| t.service_type_name.as_str())
      .collect();
    validate_default_services(&rules, &context.instance.default_services, &service_types)?;
    validate_principals(&rules, &environment.principals)?;
    validate_application_policies(&rules, &environment.policies, &environment.principals)?;

    for sp in &context.service_packages {
      validate_digested_policies(&rules, &sp.content, &environment.principals)?;
    }
    Ok(())
  }
}

fn file_detector(rules: &Rules, element: &str, case: CaseSensitivity) -> DuplicateDetector {
  let detector = DuplicateDetector::new(element, "Name", case);
  match rules.file() {
    Some(file) => detector.in_file(file),
    None => detector,
  }
}

/// Duplicates keyed on a reference attribute rather than a name.
fn reference_detector(rules: &Rules, element: &str, attribute: &str) -> DuplicateDetector {
  let detector = DuplicateDetector::new(element, attribute, CaseSensitivity::Insensitive);
  match rules.file() {
    Some(file) => detector.in_file(file),
    None => detector,
  }
}

fn user_exists(principals: &SecurityPrincipals, name: &str) -> bool {
  principals.users.iter().any(|u| u.name.eq_ignore_ascii_case(name))
}

fn principal_exists(principals: &SecurityPrincipals, name: &str) -> bool {
  user_exists(principals, name) || principals.groups.iter().any(|g| g.name.eq_ignore_ascii_case(name))
}

fn invalid_reference(rules: &Rules, element: &str, attribute: &str, value: &str, target: &'static str) -> ValidationError {
  ValidationError::InvalidReference {
    at: rules.at(element, attribute),
    value: value.to_string(),
    target,
  }
}

/// The isolation mode a container host policy runs with.
///
/// An unset value or `default` means process isolation.
pub(crate) fn isolation_mode(value: Option<&str>) -> String {
  match value.map(str::trim) {
    None | Some("") => "process".to_string(),
    Some(v) if v.eq_ignore_ascii_case("default") => "process".to_string(),
    Some(v) => v.to_lowercase(),
  }
}

fn validate_import(
  rules: &Rules,
  import: &ServiceManifestImport,
  entity: &ServiceManifestEntity,
  principals: &SecurityPrincipals,
) -> Result<(), ValidationError> {
  let has_package = |kind: PackageKind, name: &str| entity.package(kind, name).is_some();
  let has_endpoint = |name: &str| entity.manifest.endpoints.iter().any(|e| e.name == name);

  for config in &import.config_overrides {
    if !has_package(PackageKind::Config, &config.name) {
      return Err(invalid_reference(rules, "ConfigOverride", "Name", &config.name, "config package"));
    }
  }

  let bindings = file_detector(rules, "EndpointBindingPolicy", CaseSensitivity::Sensitive);
  let run_as_entries = reference_detector(rules, "RunAsPolicy", "CodePackageRef");
  for policy in &import.policies {
    let element = policy.kind_name();
    match policy {
      ImportPolicy::RunAs {
        code_package_ref,
        user_ref,
        entry_point_type,
      } => {
        if !has_package(PackageKind::Code, code_package_ref) {
          return Err(invalid_reference(rules, element, "CodePackageRef", code_package_ref, "code package"));
        }
        if !user_exists(principals, user_ref) {
          return Err(invalid_reference(rules, element, "UserRef", user_ref, "user"));
        }
        let entry_point_type = entry_point_type.as_deref().unwrap_or("Main");
        match rules.enum_member(&rules.at(element, "EntryPointType"), entry_point_type, ENTRY_POINT_TYPES)? {
          Some("All") => {
            run_as_entries.add(&format!("{code_package_ref} (Main)"))?;
            run_as_entries.add(&format!("{code_package_ref} (Setup)"))?;
          }
          Some(entry) => run_as_entries.add(&format!("{code_package_ref} ({entry})"))?,
          None => run_as_entries.add(&format!("{code_package_ref} ({entry_point_type})"))?,
        }
      }
      ImportPolicy::SecurityAccess {
        resource_ref,
        principal_ref,
        grant_rights,
      } => {
        if !has_endpoint(resource_ref) {
          return Err(invalid_reference(rules, element, "ResourceRef", resource_ref, "endpoint"));
        }
        if !principal_exists(principals, principal_ref) {
          return Err(invalid_reference(rules, element, "PrincipalRef", principal_ref, "principal"));
        }
        if let Some(rights) = grant_rights {
          rules.enum_member(&rules.at(element, "GrantRights"), rights, GRANT_RIGHTS)?;
        }
      }
      ImportPolicy::PackageSharing { package_ref, scope } => {
        if let Some(package_ref) = package_ref {
          if !entity.packages().any(|p| &p.description.name == package_ref) {
            return Err(invalid_reference(rules, element, "PackageRef", package_ref, "package"));
          }
        }
        if let Some(scope) = scope {
          rules.enum_member(&rules.at(element, "Scope"), scope, SHARING_SCOPES)?;
        }
      }
      ImportPolicy::EndpointBinding {
        endpoint_ref,
        certificate_ref,
      } => {
        if !has_endpoint(endpoint_ref) {
          return Err(invalid_reference(rules, element, "EndpointRef", endpoint_ref, "endpoint"));
        }
        bindings.add(endpoint_ref)?;
        rules.not_empty(&rules.at(element, "CertificateRef"), Some(certificate_ref.as_str()))?;
      }
      ImportPolicy::ContainerHost {
        code_package_ref,
        isolation,
        ..
      } => {
        if !has_package(PackageKind::Code, code_package_ref) {
          return Err(invalid_reference(rules, element, "CodePackageRef", code_package_ref, "code package"));
        }
        if let Some(isolation) = isolation {
          if rules.should_validate(isolation) {
            validate_isolation(rules, &isolation_mode(Some(isolation)))?;
          }
        }
      }
      ImportPolicy::ResourceGovernance {
        code_package_ref,
        cpu_shares,
        memory_in_mb,
      } => {
        if !has_package(PackageKind::Code, code_package_ref) {
          return Err(invalid_reference(rules, element, "CodePackageRef", code_package_ref, "code package"));
        }
        validate_governance(rules, cpu_shares.as_deref(), memory_in_mb.as_deref())?;
      }
    }
  }
  Ok(())
}

fn validate_isolation(rules: &Rules, mode: &str) -> Result<(), ValidationError> {
  rules
    .enum_member(&rules.at("ContainerHostPolicies", "Isolation"), mode, ISOLATION_MODES)
    .map(|_| ())
}

fn validate_governance(rules: &Rules, cpu_shares: Option<&str>, memory_in_mb: Option<&str>) -> Result<(), ValidationError> {
  if let Some(cpu) = cpu_shares {
    rules.non_negative_integer(&rules.at("ResourceGovernancePolicy", "CpuShares"), cpu)?;
  }
  if let Some(memory) = memory_in_mb {
    rules.non_negative_integer(&rules.at("ResourceGovernancePolicy", "MemoryInMB"), memory)?;
  }
  Ok(())
}

fn validate_default_services(
  rules: &Rules,
  services: &[DefaultService],
  service_types: &HashSet<&str>,
) -> Result<(), ValidationError> {
  let names = file_detector(rules, "DefaultService", CaseSensitivity::Sensitive);

  for service in services {
    const ELEMENT: &str = "DefaultService";
    rules.name(&rules.at(ELEMENT, "Name"), &service.name)?;
    names.add(&service.name)?;

    if !service_types.contains(service.service_type_name.as_str()) {
      return Err(invalid_reference(
        rules,
        ELEMENT,
        "ServiceTypeName",
        &service.service_type_name,
        "service type",
      ));
    }

    let kind = format!("{:?}", service.kind);
    let discriminator = ("Kind", kind.as_str());
    match service.kind {
      ServiceKind::Stateless => {
        let replica_at = rules.at(ELEMENT, "TargetReplicaSetSize");
        rules.exclusive(&replica_at, service.target_replica_set_size.as_deref(), Presence::Forbidden, discriminator)?;
        rules.exclusive(
          &rules.at(ELEMENT, "MinReplicaSetSize"),
          service.min_replica_set_size.as_deref(),
          Presence::Forbidden,
          discriminator,
        )?;
        if let Some(count) = &service.instance_count {
          let at = rules.at(ELEMENT, "InstanceCount");
          // -1 places one instance on every node.
          if let Some(n) = rules.convert::<i64>(&at, count)? {
            if n != -1 && n <= 0 {
              return Err(ValidationError::ValueMustBeGreaterThanZero {
                at,
                value: count.clone(),
              });
            }
          }
        }
      }
      ServiceKind::Stateful => {
        rules.exclusive(
          &rules.at(ELEMENT, "InstanceCount"),
          service.instance_count.as_deref(),
          Presence::Forbidden,
          discriminator,
        )?;
        if let Some(size) = &service.target_replica_set_size {
          rules.positive_integer(&rules.at(ELEMENT, "TargetReplicaSetSize"), size)?;
        }
        if let Some(size) = &service.min_replica_set_size {
          rules.positive_integer(&rules.at(ELEMENT, "MinReplicaSetSize"), size)?;
        }
      }
    }

    if let Some(count) = &service.partition_count {
      rules.positive_integer(&rules.at(ELEMENT, "PartitionCount"), count)?;
    }
    if let Some(mode) = &service.service_package_activation_mode {
      rules.enum_member(&rules.at(ELEMENT, "ServicePackageActivationMode"), mode, ACTIVATION_MODES)?;
    }
  }
  Ok(())
}

fn validate_application_policies(
  rules: &Rules,
  policies: &ApplicationPolicies,
  principals: &SecurityPrincipals,
) -> Result<(), ValidationError> {
  if let Some(run_as) = &policies.default_run_as {
    if !user_exists(principals, &run_as.user_ref) {
      return Err(invalid_reference(rules, "DefaultRunAsPolicy", "UserRef", &run_as.user_ref, "user"));
    }
  }
  for policy in &policies.security_access_policies {
    if !principal_exists(principals, &policy.principal_ref) {
      return Err(invalid_reference(
        rules,
        "SecurityAccessPolicy",
        "PrincipalRef",
        &policy.principal_ref,
        "principal",
      ));
    }
    if let Some(rights) = &policy.grant_rights {
      rules.enum_member(&rules.at("SecurityAccessPolicy", "GrantRights"), rights, GRANT_RIGHTS)?;
    }
  }
  Ok(())
}

/// Instance-level checks of policies after they were folded into a service package.
fn validate_digested_policies(
  rules: &Rules,
  content: &ServicePackageContent,
  principals: &SecurityPrincipals,
) -> Result<(), ValidationError> {
  for code in &content.code_packages {
    for run_as in &code.run_as {
      if !user_exists(principals, &run_as.user_ref) {
        return Err(invalid_reference(rules, "RunAsPolicy", "UserRef", &run_as.user_ref, "user"));
      }
      rules.enum_member(&rules.at("RunAsPolicy", "EntryPointType"), &run_as.entry_point_type, ENTRY_POINT_TYPES)?;
    }
    if let Some(host) = &code.container_host {
      validate_isolation(rules, &host.isolation)?;
    }
    if let Some(governance) = &code.resource_governance {
      validate_governance(rules, governance.cpu_shares.as_deref(), governance.memory_in_mb.as_deref())?;
    }
  }
  for policy in &content.security_access_policies {
    if let Some(rights) = &policy.grant_rights {
      rules.enum_member(&rules.at("SecurityAccessPolicy", "GrantRights"), rights, GRANT_RIGHTS)?;
    }
  }
  for shared in &content.shared_packages {
    rules.enum_member(&rules.at("PackageSharingPolicy", "Scope"), &shared.scope, SHARING_SCOPES)?;
  }
  Ok(())
}
