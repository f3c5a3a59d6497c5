use super::{ParameterError, ResolvedParameters, token_name};
use crate::manifest::{
  ApplicationPolicies, AzureBlobDestination, ConfigOverride, DefaultService, Destinations, DiagnosticParameter, DiagnosticSource,
  Diagnostics, FileStoreDestination, FolderSource, ImportPolicy, LocalStoreDestination, SecurityPrincipals, User,
};

/// Replace a whole-value `[Name]` token with its resolved value.
///
/// Values that are not tokens are returned unchanged.
pub fn substitute(value: &str, parameters: &ResolvedParameters) -> Result<String, ParameterError> {
  match token_name(value) {
    Some(name) => parameters
      .get(name)
      .map(str::to_string)
      .ok_or_else(|| ParameterError::UnresolvedReference {
        token: value.to_string(),
      }),
    None => Ok(value.to_string()),
  }
}

pub fn substitute_opt(
  value: Option<String>,
  parameters: &ResolvedParameters,
) -> Result<Option<String>, ParameterError> {
  value.map(|v| substitute(&v, parameters)).transpose()
}

/// A manifest subtree whose parameterizable attributes can be resolved.
pub trait ApplyParameters: Sized {
  fn apply_parameters(self, parameters: &ResolvedParameters) -> Result<Self, ParameterError>;
}

impl<T: ApplyParameters> ApplyParameters for Vec<T> {
  fn apply_parameters(self, parameters: &ResolvedParameters) -> Result<Self, ParameterError> {
    self.into_iter().map(|item| item.apply_parameters(parameters)).collect()
  }
}

impl<T: ApplyParameters> ApplyParameters for Option<T> {
  fn apply_parameters(self, parameters: &ResolvedParameters) -> Result<Self, ParameterError> {
    self.map(|item| item.apply_parameters(parameters)).transpose()
  }
}

impl ApplyParameters for SecurityPrincipals {
  fn apply_parameters(self, parameters: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      groups: self.groups,
      users: self.users.apply_parameters(parameters)?,
    })
  }
}

impl ApplyParameters for User {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      account_name: substitute_opt(self.account_name, p)?,
      password: substitute_opt(self.password, p)?,
      password_encrypted: substitute_opt(self.password_encrypted, p)?,
      ..self
    })
  }
}

impl ApplyParameters for Diagnostics {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      crash_dump_source: self.crash_dump_source.apply_parameters(p)?,
      etw_source: self.etw_source.apply_parameters(p)?,
      folder_sources: self.folder_sources.apply_parameters(p)?,
    })
  }
}

impl ApplyParameters for DiagnosticSource {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      is_enabled: substitute_opt(self.is_enabled, p)?,
      destinations: self.destinations.apply_parameters(p)?,
      parameters: self.parameters.apply_parameters(p)?,
    })
  }
}

impl ApplyParameters for FolderSource {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      is_enabled: substitute_opt(self.is_enabled, p)?,
      relative_folder_path: substitute_opt(self.relative_folder_path, p)?,
      data_deletion_age_in_days: substitute_opt(self.data_deletion_age_in_days, p)?,
      destinations: self.destinations.apply_parameters(p)?,
      parameters: self.parameters.apply_parameters(p)?,
    })
  }
}

impl ApplyParameters for Destinations {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      azure_blobs: self.azure_blobs.apply_parameters(p)?,
      file_stores: self.file_stores.apply_parameters(p)?,
      local_stores: self.local_stores.apply_parameters(p)?,
    })
  }
}

impl ApplyParameters for AzureBlobDestination {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      is_enabled: substitute_opt(self.is_enabled, p)?,
      connection_string: substitute_opt(self.connection_string, p)?,
      connection_string_is_encrypted: substitute_opt(self.connection_string_is_encrypted, p)?,
      container_name: substitute_opt(self.container_name, p)?,
      upload_interval_in_minutes: substitute_opt(self.upload_interval_in_minutes, p)?,
      data_deletion_age_in_days: substitute_opt(self.data_deletion_age_in_days, p)?,
      level_filter: substitute_opt(self.level_filter, p)?,
      parameters: self.parameters.apply_parameters(p)?,
    })
  }
}

impl ApplyParameters for FileStoreDestination {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      is_enabled: substitute_opt(self.is_enabled, p)?,
      path: substitute_opt(self.path, p)?,
      upload_interval_in_minutes: substitute_opt(self.upload_interval_in_minutes, p)?,
      data_deletion_age_in_days: substitute_opt(self.data_deletion_age_in_days, p)?,
      account_type: substitute_opt(self.account_type, p)?,
      account_name: substitute_opt(self.account_name, p)?,
      password: substitute_opt(self.password, p)?,
      password_encrypted: substitute_opt(self.password_encrypted, p)?,
      level_filter: substitute_opt(self.level_filter, p)?,
      parameters: self.parameters.apply_parameters(p)?,
    })
  }
}

impl ApplyParameters for LocalStoreDestination {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      is_enabled: substitute_opt(self.is_enabled, p)?,
      relative_folder_path: substitute_opt(self.relative_folder_path, p)?,
      data_deletion_age_in_days: substitute_opt(self.data_deletion_age_in_days, p)?,
      level_filter: substitute_opt(self.level_filter, p)?,
      parameters: self.parameters.apply_parameters(p)?,
    })
  }
}

impl ApplyParameters for DiagnosticParameter {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      value: substitute(&self.value, p)?,
      ..self
    })
  }
}

impl ApplyParameters for DefaultService {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(Self {
      instance_count: substitute_opt(self.instance_count, p)?,
      target_replica_set_size: substitute_opt(self.target_replica_set_size, p)?,
      min_replica_set_size: substitute_opt(self.min_replica_set_size, p)?,
      partition_count: substitute_opt(self.partition_count, p)?,
      service_package_activation_mode: substitute_opt(self.service_package_activation_mode, p)?,
      placement_constraints: substitute_opt(self.placement_constraints, p)?,
      ..self
    })
  }
}

impl ApplyParameters for ConfigOverride {
  fn apply_parameters(mut self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    for setting in &mut self.settings {
      setting.value = substitute(&setting.value, p)?;
    }
    Ok(self)
  }
}

impl ApplyParameters for ApplicationPolicies {
  fn apply_parameters(mut self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    for policy in &mut self.security_access_policies {
      policy.grant_rights = substitute_opt(policy.grant_rights.take(), p)?;
    }
    Ok(self)
  }
}

impl ApplyParameters for ImportPolicy {
  fn apply_parameters(self, p: &ResolvedParameters) -> Result<Self, ParameterError> {
    Ok(match self {
      ImportPolicy::RunAs {
        code_package_ref,
        user_ref,
        entry_point_type,
      } => ImportPolicy::RunAs {
        code_package_ref,
        user_ref,
        entry_point_type: substitute_opt(entry_point_type, p)?,
      },
      ImportPolicy::SecurityAccess {
        resource_ref,
        principal_ref,
        grant_rights,
      } => ImportPolicy::SecurityAccess {
        resource_ref,
        principal_ref,
        grant_rights: substitute_opt(grant_rights, p)?,
      },
      ImportPolicy::EndpointBinding {
        endpoint_ref,
        certificate_ref,
      } => ImportPolicy::EndpointBinding {
        endpoint_ref,
        certificate_ref: substitute(&certificate_ref, p)?,
      },
      ImportPolicy::ContainerHost {
        code_package_ref,
        isolation,
        hostname,
      } => ImportPolicy::ContainerHost {
        code_package_ref,
        isolation: substitute_opt(isolation, p)?,
        hostname: substitute_opt(hostname, p)?,
      },
      ImportPolicy::ResourceGovernance {
        code_package_ref,
        cpu_shares,
        memory_in_mb,
      } => ImportPolicy::ResourceGovernance {
        code_package_ref,
        cpu_shares: substitute_opt(cpu_shares, p)?,
        memory_in_mb: substitute_opt(memory_in_mb, p)?,
      },
      sharing @ ImportPolicy::PackageSharing { .. } => sharing,
    })
  }
}
