//! Service manifest rules: identity, service types, packages and endpoints.

use std::collections::BTreeSet;

use super::{CaseSensitivity, DuplicateDetector, Rules, TypeFlags, ValidationError, ValidationMode, Validator};
use crate::context::{ApplicationInstanceContext, ApplicationTypeContext, ServiceManifestEntity};
use crate::manifest::{EndpointDescription, PackageDescription, PackageKind, ServiceTypeDescription};

#[derive(Debug, Clone, Default)]
pub struct ServiceManifestValidator {
  /// File names reserved by the runtime; an entry point may not shadow them.
  runtime_assemblies: BTreeSet<String>,
}

impl ServiceManifestValidator {
  pub fn new(runtime_assemblies: impl IntoIterator<Item = String>) -> Self {
    Self {
      runtime_assemblies: runtime_assemblies.into_iter().map(|a| a.to_lowercase()).collect(),
    }
  }

  fn validate_manifest(&self, rules: &Rules, entity: &ServiceManifestEntity) -> Result<(), ValidationError> {
    let manifest = &entity.manifest;
    rules.name(&rules.at("ServiceManifest", "Name"), &manifest.name)?;
    rules.not_empty(&rules.at("ServiceManifest", "Version"), Some(manifest.version.as_str()))?;

    validate_service_types(rules, &manifest.service_types)?;

    if manifest.code_packages.is_empty() {
      return Err(ValidationError::EmptyValueNotAllowed {
        at: rules.at("ServiceManifest", "CodePackage"),
      });
    }
    for (kind, packages) in [
      (PackageKind::Code, &manifest.code_packages),
      (PackageKind::Config, &manifest.config_packages),
      (PackageKind::Data, &manifest.data_packages),
    ] {
      self.validate_packages(rules, kind, packages.iter())?;
    }
    validate_endpoints(rules, manifest.endpoints.iter())
  }

  fn validate_packages<'a>(
    &self,
    rules: &Rules,
    kind: PackageKind,
    packages: impl Iterator<Item = &'a PackageDescription>,
  ) -> Result<(), ValidationError> {
    let element = kind.element_name();
    let names = detector(rules, element, CaseSensitivity::Insensitive);
    for package in packages {
      rules.name(&rules.at(element, "Name"), &package.name)?;
      names.add(&package.name)?;
      rules.not_empty(&rules.at(element, "Version"), Some(package.version.as_str()))?;

      if let (PackageKind::Code, Some(entry_point)) = (kind, package.entry_point.as_deref()) {
        self.validate_entry_point(rules, entry_point)?;
      }
    }
    Ok(())
  }

  fn validate_entry_point(&self, rules: &Rules, entry_point: &str) -> Result<(), ValidationError> {
    let at = rules.at("ExeHost", "Program");
    rules.not_empty(&at, Some(entry_point))?;
    rules.relative_path(&at, entry_point)?;
    if !rules.should_validate(entry_point) {
      return Ok(());
    }
    let file_name = entry_point.rsplit(['/', '\\']).next().unwrap_or(entry_point);
    if self.runtime_assemblies.contains(&file_name.to_lowercase()) {
      return Err(ValidationError::InvalidName {
        at,
        value: entry_point.to_string(),
        reason: "the file name is reserved by the runtime",
      });
    }
    Ok(())
  }
}

impl Validator for ServiceManifestValidator {
  fn name(&self) -> &'static str {
    "ServiceManifestValidator"
  }

  fn validate_type(&self, context: &ApplicationTypeContext, _flags: TypeFlags) -> Result<(), ValidationError> {
    for entity in &context.service_manifests {
      let rules = Rules::new(ValidationMode::Type, Some(entity.source.as_str()));
      self.validate_manifest(&rules, entity)?;
    }
    Ok(())
  }

  fn validate_instance(&self, context: &ApplicationInstanceContext) -> Result<(), ValidationError> {
    let rules = Rules::new(ValidationMode::Instance, None);
    for sp in &context.service_packages {
      let content = &sp.content;
      validate_service_types(&rules, &content.service_types)?;
      self.validate_packages(&rules, PackageKind::Code, content.code_packages.iter().map(|c| &c.package))?;
      self.validate_packages(&rules, PackageKind::Config, content.config_packages.iter().map(|c| &c.package))?;
      self.validate_packages(&rules, PackageKind::Data, content.data_packages.iter().map(|c| &c.package))?;
      validate_endpoints(&rules, content.endpoints.iter().map(|e| &e.endpoint))?;
    }
    Ok(())
  }
}

fn detector(rules: &Rules, element: &str, case: CaseSensitivity) -> DuplicateDetector {
  let detector = DuplicateDetector::new(element, "Name", case);
  match rules.file() {
    Some(file) => detector.in_file(file),
    None => detector,
  }
}

fn validate_service_types(rules: &Rules, types: &[ServiceTypeDescription]) -> Result<(), ValidationError> {
  let names = detector(rules, "ServiceType", CaseSensitivity::Sensitive);
  for service_type in types {
    rules.not_empty(
      &rules.at("ServiceType", "ServiceTypeName"),
      Some(service_type.service_type_name.as_str()),
    )?;
    names.add(&service_type.service_type_name)?;
  }
  Ok(())
}

fn validate_endpoints<'a>(
  rules: &Rules,
  endpoints: impl Iterator<Item = &'a EndpointDescription>,
) -> Result<(), ValidationError> {
  let names = detector(rules, "Endpoint", CaseSensitivity::Insensitive);
  for endpoint in endpoints {
    rules.not_empty(&rules.at("Endpoint", "Name"), Some(endpoint.name.as_str()))?;
    names.add(&endpoint.name)?;
    if let Some(port) = &endpoint.port {
      rules.non_negative_integer(&rules.at("Endpoint", "Port"), port)?;
    }
  }
  Ok(())
}
