//! Canonical ordering of order-insensitive collections.
//!
//! Canonicalization is a value transform: it consumes a tree and returns the
//! same tree with every order-insensitive collection sorted. Collections whose
//! order carries meaning are left alone.
//!
//! # Sort keys
//!
//! ```text
//! declared parameters            name
//! packages, endpoints, types     name
//! groups, users                  name
//! group membership               DomainUser < DomainGroup < SystemGroup, then name
//! user membership                Group < SystemGroup, then name
//! import policies                RunAs < SecurityAccess < PackageSharing
//!                                < EndpointBinding < ContainerHost < ResourceGovernance,
//!                                then reference key
//! security access policies       resource, then principal
//! config overrides               package name; settings by section, then parameter
//! diagnostics                    folder path / container / store path; parameters by name
//! ```
//!
//! Untouched: service manifest imports, default services, service package refs.
//!
//! Ties on the sort key fall back to the full structural ordering so that
//! equal-keyed elements still land in one order regardless of input order.

use std::cmp::Ordering;

use crate::context::ApplicationInstanceContext;
use crate::manifest::{
  ApplicationInstance, ApplicationManifest, ApplicationPackage, ApplicationPolicies, AzureBlobDestination,
  ConfigOverride, Destinations, DiagnosticParameter, DiagnosticSource, Diagnostics, DigestedEnvironment,
  FileStoreDestination, FolderSource, Group, GroupMember, ImportPolicy, LocalStoreDestination, SecurityPrincipals,
  ServiceDiagnostics, ServiceManifest, ServiceManifestImport, ServicePackage, ServicePackageContent, User,
  UserMembership,
};

/// A tree with a canonical form.
pub trait Canonical: Sized {
  /// Return the canonical form of `self`. Must be idempotent.
  fn canonicalize(self) -> Self;
}

/// Canonicalize a copy of a shared value.
pub fn canonicalize<T: Canonical + Clone>(value: &T) -> T {
  value.clone().canonicalize()
}

fn canonical_vec<T: Canonical>(items: Vec<T>) -> Vec<T> {
  items.into_iter().map(Canonical::canonicalize).collect()
}

fn sort_with_key<T: Ord, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
  items.sort_by(|a, b| key(a).cmp(&key(b)).then_with(|| a.cmp(b)));
}

fn by_policy_kind(a: &ImportPolicy, b: &ImportPolicy) -> Ordering {
  a.kind_rank()
    .cmp(&b.kind_rank())
    .then_with(|| a.reference_key().cmp(b.reference_key()))
    .then_with(|| a.cmp(b))
}

impl Canonical for ApplicationManifest {
  fn canonicalize(mut self) -> Self {
    sort_with_key(&mut self.parameters, |p| p.name.clone());
    self.service_manifest_imports = canonical_vec(self.service_manifest_imports);
    self.principals = self.principals.canonicalize();
    self.policies = self.policies.canonicalize();
    self.diagnostics = self.diagnostics.canonicalize();
    self
  }
}

impl Canonical for ServiceManifestImport {
  fn canonicalize(mut self) -> Self {
    self.config_overrides = canonical_vec(self.config_overrides);
    sort_with_key(&mut self.config_overrides, |o| o.name.clone());
    self.policies.sort_by(by_policy_kind);
    self
  }
}

impl Canonical for ConfigOverride {
  fn canonicalize(mut self) -> Self {
    sort_with_key(&mut self.settings, |s| (s.section.clone(), s.parameter.clone()));
    self
  }
}

impl Canonical for SecurityPrincipals {
  fn canonicalize(mut self) -> Self {
    self.groups = canonical_vec(self.groups);
    sort_with_key(&mut self.groups, |g| g.name.clone());
    self.users = canonical_vec(self.users);
    sort_with_key(&mut self.users, |u| u.name.clone());
    self
  }
}

impl Canonical for Group {
  fn canonicalize(mut self) -> Self {
    sort_with_key(&mut self.membership, |m: &GroupMember| (m.kind_rank(), m.name().to_string()));
    self
  }
}

impl Canonical for User {
  fn canonicalize(mut self) -> Self {
    sort_with_key(&mut self.member_of, |m: &UserMembership| (m.kind_rank(), m.name().to_string()));
    self
  }
}

impl Canonical for ApplicationPolicies {
  fn canonicalize(mut self) -> Self {
    sort_with_key(&mut self.security_access_policies, |p| {
      (p.resource_ref.clone(), p.principal_ref.clone())
    });
    self
  }
}

impl Canonical for Diagnostics {
  fn canonicalize(mut self) -> Self {
    self.crash_dump_source = self.crash_dump_source.map(Canonical::canonicalize);
    self.etw_source = self.etw_source.map(Canonical::canonicalize);
    self.folder_sources = canonical_vec(self.folder_sources);
    sort_with_key(&mut self.folder_sources, |f| f.relative_folder_path.clone());
    self
  }
}

impl Canonical for DiagnosticSource {
  fn canonicalize(mut self) -> Self {
    self.destinations = self.destinations.canonicalize();
    sort_parameters(&mut self.parameters);
    self
  }
}

impl Canonical for FolderSource {
  fn canonicalize(mut self) -> Self {
    self.destinations = self.destinations.canonicalize();
    sort_parameters(&mut self.parameters);
    self
  }
}

impl Canonical for Destinations {
  fn canonicalize(mut self) -> Self {
    for blob in &mut self.azure_blobs {
      sort_parameters(&mut blob.parameters);
    }
    for store in &mut self.file_stores {
      sort_parameters(&mut store.parameters);
    }
    for store in &mut self.local_stores {
      sort_parameters(&mut store.parameters);
    }
    sort_with_key(&mut self.azure_blobs, |b: &AzureBlobDestination| {
      (b.container_name.clone(), b.connection_string.clone())
    });
    sort_with_key(&mut self.file_stores, |s: &FileStoreDestination| s.path.clone());
    sort_with_key(&mut self.local_stores, |s: &LocalStoreDestination| s.relative_folder_path.clone());
    self
  }
}

fn sort_parameters(parameters: &mut [DiagnosticParameter]) {
  sort_with_key(parameters, |p| p.name.clone());
}

impl Canonical for ServiceManifest {
  fn canonicalize(mut self) -> Self {
    sort_with_key(&mut self.service_types, |t| t.service_type_name.clone());
    sort_with_key(&mut self.code_packages, |p| p.name.clone());
    sort_with_key(&mut self.config_packages, |p| p.name.clone());
    sort_with_key(&mut self.data_packages, |p| p.name.clone());
    sort_with_key(&mut self.endpoints, |e| e.name.clone());
    self.diagnostics = self.diagnostics.canonicalize();
    self
  }
}

impl Canonical for ServiceDiagnostics {
  fn canonicalize(mut self) -> Self {
    if let Some(etw) = self.etw.as_mut() {
      etw.provider_guids.sort();
      sort_with_key(&mut etw.manifest_data_packages, |p| p.name.clone());
    }
    self
  }
}

impl Canonical for DigestedEnvironment {
  fn canonicalize(self) -> Self {
    Self {
      principals: self.principals.canonicalize(),
      policies: self.policies.canonicalize(),
      diagnostics: self.diagnostics.canonicalize(),
    }
  }
}

impl Canonical for ServicePackageContent {
  fn canonicalize(mut self) -> Self {
    sort_with_key(&mut self.service_types, |t| t.service_type_name.clone());
    for config in &mut self.config_packages {
      sort_with_key(&mut config.setting_overrides, |s| (s.section.clone(), s.parameter.clone()));
    }
    sort_with_key(&mut self.code_packages, |p| p.package.name.clone());
    sort_with_key(&mut self.config_packages, |p| p.package.name.clone());
    sort_with_key(&mut self.data_packages, |p| p.package.name.clone());
    sort_with_key(&mut self.endpoints, |e| e.endpoint.name.clone());
    sort_with_key(&mut self.security_access_policies, |p| {
      (p.resource_ref.clone(), p.principal_ref.clone())
    });
    sort_with_key(&mut self.shared_packages, |p| p.package_ref.clone());
    self.diagnostics = self.diagnostics.canonicalize();
    self
  }
}

impl Canonical for ApplicationPackage {
  fn canonicalize(mut self) -> Self {
    self.environment = self.environment.canonicalize();
    self
  }
}

impl Canonical for ServicePackage {
  fn canonicalize(mut self) -> Self {
    self.content = self.content.canonicalize();
    self
  }
}

impl Canonical for ApplicationInstance {
  fn canonicalize(self) -> Self {
    self
  }
}

impl Canonical for ApplicationInstanceContext {
  fn canonicalize(self) -> Self {
    Self {
      instance: self.instance.canonicalize(),
      application_package: self.application_package.canonicalize(),
      service_packages: canonical_vec(self.service_packages),
      parameters: self.parameters,
    }
  }
}
