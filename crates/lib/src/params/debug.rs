//! The reserved debug parameter.
//!
//! Its value is a JSON array naming the code packages to launch under a
//! debugger:
//!
//! ```json
//! [{ "service_manifest_name": "Web", "code_package_name": "Code",
//!    "entry_point_type": "Main", "program_exe_path": "dbg.exe", "arguments": "-p" }]
//! ```

use serde::Deserialize;

use super::ParameterError;
use crate::consts::DEBUG_PARAMETERS_KEY;
use crate::manifest::DebugParameters;

const ENTRY_POINT_TYPES: &[&str] = &["Setup", "Main", "All"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodePackageDebugParameters {
  pub service_manifest_name: String,
  pub code_package_name: String,
  pub entry_point_type: Option<String>,
  pub program_exe_path: Option<String>,
  pub arguments: Option<String>,
  pub working_folder: Option<String>,
  pub code_package_link_folder: Option<String>,
  pub lock_file: Option<String>,
  pub debug_parameters_file: Option<String>,
  pub environment_block: Option<String>,
}

impl CodePackageDebugParameters {
  pub fn applies_to(&self, service_manifest: &str, code_package: &str) -> bool {
    self.service_manifest_name.eq_ignore_ascii_case(service_manifest)
      && self.code_package_name.eq_ignore_ascii_case(code_package)
  }

  /// The digested form. An unknown or missing entry point type means Main.
  pub fn digest(&self) -> DebugParameters {
    let entry_point_type = self
      .entry_point_type
      .as_deref()
      .and_then(|value| ENTRY_POINT_TYPES.iter().find(|t| t.eq_ignore_ascii_case(value.trim())))
      .unwrap_or(&"Main");
    DebugParameters {
      entry_point_type: entry_point_type.to_string(),
      program_exe_path: self.program_exe_path.clone(),
      arguments: self.arguments.clone(),
      working_folder: self.working_folder.clone(),
      code_package_link_folder: self.code_package_link_folder.clone(),
      lock_file: self.lock_file.clone(),
      debug_parameters_file: self.debug_parameters_file.clone(),
      environment_block: self.environment_block.clone(),
    }
  }
}

/// Parse the value of the debug parameter. A blank value carries no entries.
pub fn parse_debug_parameters(value: &str) -> Result<Vec<CodePackageDebugParameters>, ParameterError> {
  if value.trim().is_empty() {
    return Ok(Vec::new());
  }
  serde_json::from_str(value).map_err(|e| ParameterError::InvalidValue {
    name: DEBUG_PARAMETERS_KEY.to_string(),
    reason: e.to_string(),
  })
}
