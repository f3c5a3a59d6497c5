//! Shared fixtures for library integration tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use imagebuilder_lib::Deadline;
use imagebuilder_lib::config::BuilderConfig;
use imagebuilder_lib::manifest::{
  ApplicationManifest, ConfigOverride, DefaultService, ManifestParameter, PackageDescription, ServiceKind,
  ServiceManifest, ServiceManifestImport, ServiceManifestRef, ServiceTypeDescription, SettingOverride,
};
use imagebuilder_lib::store::{ArtifactStore, MemoryStore, StoreLayout};
use imagebuilder_lib::InstanceAssembler;
use serde::Serialize;

pub const TYPE_NAME: &str = "ShopType";
pub const TYPE_VERSION: &str = "1.0";

pub fn deadline() -> Deadline {
  Deadline::after(Duration::from_secs(60))
}

fn package(name: &str, version: &str) -> PackageDescription {
  PackageDescription {
    name: name.into(),
    version: version.into(),
    ..Default::default()
  }
}

/// `Web` service manifest with one code and one config package.
pub fn service_manifest(name: &str, version: &str) -> ServiceManifest {
  ServiceManifest {
    name: name.into(),
    version: version.into(),
    service_types: vec![ServiceTypeDescription {
      service_type_name: format!("{}Type", name),
      kind: ServiceKind::Stateless,
      has_persisted_state: false,
    }],
    code_packages: vec![PackageDescription {
      entry_point: Some("bin/web.exe".into()),
      ..package("Code", version)
    }],
    config_packages: vec![package("Config", version)],
    ..Default::default()
  }
}

/// Application type declaring `Count` (default 1) used as the default service's instance count.
pub fn application_manifest(type_version: &str, imports: &[(&str, &str)]) -> ApplicationManifest {
  ApplicationManifest {
    application_type_name: TYPE_NAME.into(),
    application_type_version: type_version.into(),
    parameters: vec![
      ManifestParameter {
        name: "Count".into(),
        default_value: "1".into(),
      },
      ManifestParameter {
        name: "Port".into(),
        default_value: "8080".into(),
      },
    ],
    service_manifest_imports: imports
      .iter()
      .map(|(name, version)| ServiceManifestImport {
        service_manifest_ref: ServiceManifestRef {
          name: (*name).into(),
          version: (*version).into(),
        },
        config_overrides: vec![ConfigOverride {
          name: "Config".into(),
          settings: vec![SettingOverride {
            section: "Http".into(),
            parameter: "Port".into(),
            value: "[Port]".into(),
          }],
        }],
        policies: Vec::new(),
      })
      .collect(),
    default_services: vec![DefaultService {
      name: "Front".into(),
      service_type_name: format!("{}Type", imports[0].0),
      kind: ServiceKind::Stateless,
      instance_count: Some("[Count]".into()),
      ..Default::default()
    }],
    ..Default::default()
  }
}

pub fn to_json<T: Serialize>(value: &T) -> String {
  serde_json::to_string_pretty(value).unwrap()
}

/// Seed a store with application type `version` importing `Web@1.0` and `Api@1.0`.
pub fn seed_type(store: &MemoryStore, version: &str) {
  let app = application_manifest(version, &[("Web", "1.0"), ("Api", "1.0")]);
  store.insert(StoreLayout::application_manifest(TYPE_NAME, version), to_json(&app));
  for name in ["Web", "Api"] {
    store.insert(
      StoreLayout::service_manifest(TYPE_NAME, name, "1.0"),
      to_json(&service_manifest(name, "1.0")),
    );
  }
}

pub fn seeded_store() -> Arc<MemoryStore> {
  let store = Arc::new(MemoryStore::new());
  seed_type(&store, TYPE_VERSION);
  store
}

pub fn assembler(store: &Arc<MemoryStore>) -> InstanceAssembler {
  let store: Arc<dyn ArtifactStore> = store.clone();
  InstanceAssembler::new(store, &BuilderConfig::default())
}

/// Write a local build layout for [`application_manifest`] with the `Web` service.
pub fn write_layout(dir: &Path, web_config: &str) {
  let app = application_manifest(TYPE_VERSION, &[("Web", "1.0")]);
  std::fs::write(dir.join("ApplicationManifest.json"), to_json(&app)).unwrap();

  let web = dir.join("Web");
  std::fs::create_dir_all(web.join("Code/bin")).unwrap();
  std::fs::create_dir_all(web.join("Config")).unwrap();
  std::fs::write(web.join("ServiceManifest.json"), to_json(&service_manifest("Web", "1.0"))).unwrap();
  std::fs::write(web.join("Code/bin/web.exe"), b"binary").unwrap();
  std::fs::write(web.join("Config/Settings.json"), web_config).unwrap();
}
