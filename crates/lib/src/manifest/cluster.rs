use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Cluster-wide settings at one cluster configuration version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterManifest {
  pub version: String,
  /// Section name to parameter name to value.
  pub sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ClusterManifest {
  pub fn value(&self, section: &str, parameter: &str) -> Option<&str> {
    self.sections.get(section)?.get(parameter).map(String::as_str)
  }
}
