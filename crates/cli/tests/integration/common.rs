//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use imagebuilder_lib::manifest::{
  ApplicationManifest, ConfigOverride, DefaultService, ManifestParameter, PackageDescription, ServiceKind,
  ServiceManifest, ServiceManifestImport, ServiceManifestRef, ServiceTypeDescription, SettingOverride,
};
use serde::Serialize;
use tempfile::TempDir;

pub const TYPE_NAME: &str = "ShopType";
pub const TYPE_VERSION: &str = "1.0";

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the artifact store and
/// a build layout for `ShopType` 1.0 importing a single `Web` service.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let env = Self { temp };
    env.write_layout("Port=8080");
    env
  }

  pub fn layout_path(&self) -> PathBuf {
    self.temp.path().join("layout")
  }

  pub fn store_path(&self) -> PathBuf {
    self.temp.path().join("store")
  }

  pub fn output_path(&self) -> PathBuf {
    self.temp.path().join("output")
  }

  /// Write a file relative to the layout directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.layout_path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  fn write_layout(&self, web_config: &str) {
    self.write_file("ApplicationManifest.json", &to_json(&application_manifest()));
    self.write_file("Web/ServiceManifest.json", &to_json(&service_manifest()));
    self.write_file("Web/Code/bin/web.exe", "binary");
    self.write_file("Web/Config/Settings.txt", web_config);
  }

  /// Get a pre-configured Command for the ib binary.
  ///
  /// Points `IMAGEBUILDER_STORE` at the isolated store and clears `RUST_LOG`
  /// so stderr only carries command errors.
  pub fn ib_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("ib");
    cmd.env("IMAGEBUILDER_STORE", self.store_path());
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("IMAGEBUILDER_TIMEOUT_SECS");
    cmd
  }

  /// Provision the layout into the store.
  pub fn provision(&self) {
    self.ib_cmd().arg("provision").arg(self.layout_path()).assert().success();
  }

  /// File backing a store key.
  pub fn store_file(&self, key: &str) -> PathBuf {
    self.store_path().join(key)
  }
}

fn to_json<T: Serialize>(value: &T) -> String {
  serde_json::to_string_pretty(value).unwrap()
}

fn service_manifest() -> ServiceManifest {
  ServiceManifest {
    name: "Web".into(),
    version: "1.0".into(),
    service_types: vec![ServiceTypeDescription {
      service_type_name: "WebType".into(),
      kind: ServiceKind::Stateless,
      has_persisted_state: false,
    }],
    code_packages: vec![PackageDescription {
      name: "Code".into(),
      version: "1.0".into(),
      entry_point: Some("bin/web.exe".into()),
      ..Default::default()
    }],
    config_packages: vec![PackageDescription {
      name: "Config".into(),
      version: "1.0".into(),
      ..Default::default()
    }],
    ..Default::default()
  }
}

fn application_manifest() -> ApplicationManifest {
  ApplicationManifest {
    application_type_name: TYPE_NAME.into(),
    application_type_version: TYPE_VERSION.into(),
    parameters: vec![ManifestParameter {
      name: "Count".into(),
      default_value: "1".into(),
    }],
    service_manifest_imports: vec![ServiceManifestImport {
      service_manifest_ref: ServiceManifestRef {
        name: "Web".into(),
        version: "1.0".into(),
      },
      config_overrides: vec![ConfigOverride {
        name: "Config".into(),
        settings: vec![SettingOverride {
          section: "Http".into(),
          parameter: "Workers".into(),
          value: "[Count]".into(),
        }],
      }],
      policies: Vec::new(),
    }],
    default_services: vec![DefaultService {
      name: "Front".into(),
      service_type_name: "WebType".into(),
      kind: ServiceKind::Stateless,
      instance_count: Some("[Count]".into()),
      ..Default::default()
    }],
    ..Default::default()
  }
}
