//! Upgrade policies of cluster settings.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::manifest::ClusterManifest;

/// How a cluster setting may change between configuration versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradePolicy {
  /// Picked up without restarting anything.
  Dynamic,
  /// Requires a restart to take effect.
  Static,
  /// May be set once; changing an existing value is rejected.
  SingleChange,
  /// May never change.
  NotAllowed,
}

/// A (section, parameter) pair whose change requires a restart.
pub type ChangedSetting = (String, String);

/// Known cluster settings and their upgrade policies.
///
/// Property-group sections hold user-defined keys; every parameter in them
/// is treated as [`UpgradePolicy::Dynamic`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsCatalog {
  settings: BTreeMap<String, BTreeMap<String, UpgradePolicy>>,
  property_groups: BTreeSet<String>,
}

impl SettingsCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// The catalog shipped with the builder.
  pub fn builtin() -> Self {
    use UpgradePolicy::*;
    [
      ("Setup", "FabricDataRoot", NotAllowed),
      ("Setup", "FabricLogRoot", NotAllowed),
      ("Security", "ClusterCredentialType", NotAllowed),
      ("Security", "ServerAuthCredentialType", NotAllowed),
      ("Security", "ClusterCertThumbprints", Dynamic),
      ("Security", "ServerCertThumbprints", Dynamic),
      ("Security", "AdminClientIdentities", Dynamic),
      ("Management", "ImageStoreConnectionString", SingleChange),
      ("Management", "ImageCachingEnabled", Dynamic),
      ("FabricNode", "StartApplicationPortRange", Static),
      ("FabricNode", "EndApplicationPortRange", Static),
      ("Hosting", "EndpointProviderEnabled", Static),
      ("Hosting", "ActivationMaxFailureCount", Dynamic),
      ("Failover", "ReconfigurationTimeLimit", Dynamic),
      ("FailoverManager", "TargetReplicaSetSize", Static),
      ("FailoverManager", "MinReplicaSetSize", Static),
      ("NamingService", "PartitionCount", NotAllowed),
      ("NamingService", "TargetReplicaSetSize", Static),
      ("Diagnostics", "ProducerInstances", Static),
      ("Diagnostics", "MaxDiskQuotaInMB", Dynamic),
      ("Trace/Etw", "Level", Dynamic),
    ]
    .into_iter()
    .fold(Self::new(), |catalog, (section, parameter, policy)| {
      catalog.with_setting(section, parameter, policy)
    })
    .with_property_group("NodeProperties")
    .with_property_group("NodeCapacities")
    .with_property_group("PlacementProperties")
  }

  pub fn with_setting(mut self, section: &str, parameter: &str, policy: UpgradePolicy) -> Self {
    self
      .settings
      .entry(section.to_string())
      .or_default()
      .insert(parameter.to_string(), policy);
    self
  }

  pub fn with_property_group(mut self, section: &str) -> Self {
    self.property_groups.insert(section.to_string());
    self
  }

  pub fn is_property_group(&self, section: &str) -> bool {
    self.property_groups.contains(section)
  }

  /// Policy for a setting; `Err` describes why the setting is unknown.
  pub fn policy(&self, section: &str, parameter: &str) -> Result<UpgradePolicy, String> {
    if self.is_property_group(section) {
      return Ok(UpgradePolicy::Dynamic);
    }
    let parameters = self
      .settings
      .get(section)
      .ok_or_else(|| format!("section '{}' is not a known configuration section", section))?;
    parameters
      .get(parameter)
      .copied()
      .ok_or_else(|| format!("parameter '{}' is not known in section '{}'", parameter, section))
  }

  /// Settings that changed between two manifests and need a restart.
  ///
  /// Fails on the first change that is not allowed at all.
  pub fn compare(&self, current: &ClusterManifest, target: &ClusterManifest) -> Result<BTreeSet<ChangedSetting>, String> {
    let keys: BTreeSet<(&str, &str)> = [current, target]
      .into_iter()
      .flat_map(|m| {
        m.sections
          .iter()
          .flat_map(|(section, params)| params.keys().map(move |p| (section.as_str(), p.as_str())))
      })
      .collect();

    let mut changed = BTreeSet::new();
    for (section, parameter) in keys {
      let before = current.value(section, parameter);
      let after = target.value(section, parameter);
      if before == after {
        continue;
      }
      match self.policy(section, parameter)? {
        UpgradePolicy::Dynamic => {}
        UpgradePolicy::Static => {
          changed.insert((section.to_string(), parameter.to_string()));
        }
        UpgradePolicy::SingleChange => {
          let was_set = before.is_some_and(|v| !v.is_empty());
          let is_set = after.is_some_and(|v| !v.is_empty());
          if was_set && is_set {
            return Err(format!("{}.{} can only be set once", section, parameter));
          }
          changed.insert((section.to_string(), parameter.to_string()));
        }
        UpgradePolicy::NotAllowed => {
          return Err(format!("{}.{} cannot be changed", section, parameter));
        }
      }
    }
    Ok(changed)
  }
}
