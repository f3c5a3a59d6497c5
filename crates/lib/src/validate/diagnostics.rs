//! Diagnostics configuration rules.
//!
//! Application diagnostics: crash dump, ETW and folder sources, each cascading
//! into Azure blob, file store and local store destinations. Service manifest
//! diagnostics: ETW manifest data packages must carry a valid version.

use super::rules::Presence;
use super::{CaseSensitivity, DuplicateDetector, Location, Rules, ValidationError, ValidationMode, Validator};
use crate::context::{ApplicationInstanceContext, ApplicationTypeContext};
use crate::manifest::{
  AzureBlobDestination, Destinations, DiagnosticParameter, Diagnostics, FileStoreDestination, LocalStoreDestination,
  ServiceDiagnostics,
};
use crate::validate::TypeFlags;

const LEVEL_FILTERS: &[&str] = &["Error", "Warning", "Informational", "Verbose"];
const FILE_STORE_ACCOUNT_TYPES: &[&str] = &["DomainUser", "ManagedServiceAccount"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
  CrashDump,
  Etw,
  Folder,
}

impl SourceKind {
  fn element(self) -> &'static str {
    match self {
      SourceKind::CrashDump => "CrashDumpSource",
      SourceKind::Etw => "ETWSource",
      SourceKind::Folder => "FolderSource",
    }
  }

  fn has_level_filter(self) -> bool {
    self == SourceKind::Etw
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticsValidator;

impl Validator for DiagnosticsValidator {
  fn name(&self) -> &'static str {
    "DiagnosticsValidator"
  }

  fn validate_type(&self, context: &ApplicationTypeContext, _flags: TypeFlags) -> Result<(), ValidationError> {
    let rules = Rules::new(ValidationMode::Type, Some(context.source.as_str()));
    validate_application_diagnostics(&rules, &context.manifest.diagnostics)?;

    for sm in &context.service_manifests {
      let rules = Rules::new(ValidationMode::Type, Some(sm.source.as_str()));
      validate_service_diagnostics(&rules, &sm.manifest.diagnostics)?;
    }
    Ok(())
  }

  fn validate_instance(&self, context: &ApplicationInstanceContext) -> Result<(), ValidationError> {
    let rules = Rules::new(ValidationMode::Instance, None);
    validate_application_diagnostics(&rules, &context.application_package.environment.diagnostics)?;

    for sp in &context.service_packages {
      validate_service_diagnostics(&rules, &sp.content.diagnostics)?;
    }
    Ok(())
  }
}

pub(crate) fn validate_application_diagnostics(rules: &Rules, diagnostics: &Diagnostics) -> Result<(), ValidationError> {
  if let Some(source) = &diagnostics.crash_dump_source {
    validate_source(
      rules,
      SourceKind::CrashDump,
      source.is_enabled.as_deref(),
      &source.destinations,
      &source.parameters,
    )?;
  }

  if let Some(source) = &diagnostics.etw_source {
    validate_source(
      rules,
      SourceKind::Etw,
      source.is_enabled.as_deref(),
      &source.destinations,
      &source.parameters,
    )?;
  }

  let folders = DuplicateDetector::new("FolderSource", "RelativeFolderPath", CaseSensitivity::Insensitive);
  for folder in &diagnostics.folder_sources {
    let element = SourceKind::Folder.element();
    let path = rules.not_empty(
      &rules.at(element, "RelativeFolderPath"),
      folder.relative_folder_path.as_deref(),
    )?;
    rules.relative_path(&rules.at(element, "RelativeFolderPath"), path)?;
    folders.add(path)?;

    if let Some(age) = &folder.data_deletion_age_in_days {
      rules.positive_integer(&rules.at(element, "DataDeletionAgeInDays"), age)?;
    }

    validate_source(
      rules,
      SourceKind::Folder,
      folder.is_enabled.as_deref(),
      &folder.destinations,
      &folder.parameters,
    )?;
  }

  Ok(())
}

pub(crate) fn validate_service_diagnostics(rules: &Rules, diagnostics: &ServiceDiagnostics) -> Result<(), ValidationError> {
  let Some(etw) = &diagnostics.etw else {
    return Ok(());
  };

  for package in &etw.manifest_data_packages {
    let at = rules.at("ManifestDataPackage", "Version");
    rules.version(&at, rules.not_empty(&at, Some(package.version.as_str()))?)?;
  }
  Ok(())
}

fn validate_source(
  rules: &Rules,
  kind: SourceKind,
  is_enabled: Option<&str>,
  destinations: &Destinations,
  parameters: &[DiagnosticParameter],
) -> Result<(), ValidationError> {
  rules.boolean(&rules.at(kind.element(), "IsEnabled"), is_enabled)?;
  validate_parameters(rules, kind.element(), parameters)?;

  for blob in &destinations.azure_blobs {
    validate_azure_blob(rules, kind, blob)?;
  }
  for store in &destinations.file_stores {
    validate_file_store(rules, kind, store)?;
  }
  for store in &destinations.local_stores {
    validate_local_store(rules, kind, store)?;
  }
  Ok(())
}

fn validate_parameters(rules: &Rules, element: &str, parameters: &[DiagnosticParameter]) -> Result<(), ValidationError> {
  let mut names = DuplicateDetector::new(format!("{}/Parameter", element), "Name", CaseSensitivity::Insensitive);
  if let Some(file) = rules.file() {
    names = names.in_file(file);
  }
  for parameter in parameters {
    rules.not_empty(&rules.at(element, "Parameter.Name"), Some(parameter.name.as_str()))?;
    names.add(&parameter.name)?;
  }
  Ok(())
}

fn destination_at(rules: &Rules, kind: SourceKind, destination: &str, attribute: &str) -> Location {
  rules.at(kind.element(), attribute).destination(destination)
}

fn validate_level_filter(
  rules: &Rules,
  kind: SourceKind,
  destination: &str,
  level_filter: Option<&str>,
) -> Result<(), ValidationError> {
  let at = destination_at(rules, kind, destination, "LevelFilter");
  if kind.has_level_filter() {
    if let Some(level) = level_filter {
      rules.enum_member(&at, level, LEVEL_FILTERS)?;
    }
    return Ok(());
  }
  rules.exclusive(&at, level_filter, Presence::Forbidden, ("Source", kind.element()))
}

fn validate_upload_and_retention(
  rules: &Rules,
  kind: SourceKind,
  destination: &str,
  upload_interval: Option<&str>,
  retention: Option<&str>,
) -> Result<(), ValidationError> {
  if let Some(interval) = upload_interval {
    rules.positive_integer(
      &destination_at(rules, kind, destination, "UploadIntervalInMinutes"),
      interval,
    )?;
  }
  if let Some(age) = retention {
    rules.positive_integer(&destination_at(rules, kind, destination, "DataDeletionAgeInDays"), age)?;
  }
  Ok(())
}

fn validate_azure_blob(rules: &Rules, kind: SourceKind, blob: &AzureBlobDestination) -> Result<(), ValidationError> {
  const DESTINATION: &str = "AzureBlob";

  rules.boolean(
    &destination_at(rules, kind, DESTINATION, "IsEnabled"),
    blob.is_enabled.as_deref(),
  )?;
  rules.not_empty(
    &destination_at(rules, kind, DESTINATION, "ConnectionString"),
    blob.connection_string.as_deref(),
  )?;
  rules.boolean(
    &destination_at(rules, kind, DESTINATION, "ConnectionStringIsEncrypted"),
    blob.connection_string_is_encrypted.as_deref(),
  )?;
  if blob.container_name.is_some() {
    rules.not_empty(
      &destination_at(rules, kind, DESTINATION, "ContainerName"),
      blob.container_name.as_deref(),
    )?;
  }
  validate_upload_and_retention(
    rules,
    kind,
    DESTINATION,
    blob.upload_interval_in_minutes.as_deref(),
    blob.data_deletion_age_in_days.as_deref(),
  )?;
  validate_level_filter(rules, kind, DESTINATION, blob.level_filter.as_deref())?;
  validate_parameters(rules, DESTINATION, &blob.parameters)
}

fn validate_file_store(rules: &Rules, kind: SourceKind, store: &FileStoreDestination) -> Result<(), ValidationError> {
  const DESTINATION: &str = "FileStore";

  rules.boolean(
    &destination_at(rules, kind, DESTINATION, "IsEnabled"),
    store.is_enabled.as_deref(),
  )?;
  let path_at = destination_at(rules, kind, DESTINATION, "Path");
  rules.uri(&path_at, rules.not_empty(&path_at, store.path.as_deref())?)?;
  validate_upload_and_retention(
    rules,
    kind,
    DESTINATION,
    store.upload_interval_in_minutes.as_deref(),
    store.data_deletion_age_in_days.as_deref(),
  )?;
  validate_level_filter(rules, kind, DESTINATION, store.level_filter.as_deref())?;
  validate_file_store_account(rules, kind, store)?;
  validate_parameters(rules, DESTINATION, &store.parameters)
}

fn validate_file_store_account(
  rules: &Rules,
  kind: SourceKind,
  store: &FileStoreDestination,
) -> Result<(), ValidationError> {
  const DESTINATION: &str = "FileStore";
  let name_at = destination_at(rules, kind, DESTINATION, "AccountName");
  let password_at = destination_at(rules, kind, DESTINATION, "Password");
  let encrypted_at = destination_at(rules, kind, DESTINATION, "PasswordEncrypted");

  let Some(account_type) = store.account_type.as_deref() else {
    let discriminator = ("AccountType", "");
    rules.exclusive(&name_at, store.account_name.as_deref(), Presence::Forbidden, discriminator)?;
    rules.password_exclusive(&password_at, store.password.as_deref(), Presence::Forbidden, discriminator)?;
    return rules.password_exclusive(
      &encrypted_at,
      store.password_encrypted.as_deref(),
      Presence::Forbidden,
      discriminator,
    );
  };

  let account_type_at = destination_at(rules, kind, DESTINATION, "AccountType");
  let resolved = rules.enum_member(&account_type_at, account_type, FILE_STORE_ACCOUNT_TYPES)?;

  if let Some(resolved) = resolved {
    let discriminator = ("AccountType", resolved);
    rules.exclusive(&name_at, store.account_name.as_deref(), Presence::Required, discriminator)?;
    let password_presence = if resolved == "DomainUser" {
      Presence::Required
    } else {
      Presence::Forbidden
    };
    rules.password_exclusive(&password_at, store.password.as_deref(), password_presence, discriminator)?;
    if password_presence == Presence::Forbidden {
      rules.password_exclusive(
        &encrypted_at,
        store.password_encrypted.as_deref(),
        Presence::Forbidden,
        discriminator,
      )?;
    }
  }

  if let Some(account_name) = store.account_name.as_deref() {
    rules.account_name(&name_at, account_name)?;
  }
  rules.boolean(&encrypted_at, store.password_encrypted.as_deref())?;
  Ok(())
}

fn validate_local_store(rules: &Rules, kind: SourceKind, store: &LocalStoreDestination) -> Result<(), ValidationError> {
  const DESTINATION: &str = "LocalStore";

  rules.boolean(
    &destination_at(rules, kind, DESTINATION, "IsEnabled"),
    store.is_enabled.as_deref(),
  )?;
  let path_at = destination_at(rules, kind, DESTINATION, "RelativeFolderPath");
  rules.relative_path(&path_at, rules.not_empty(&path_at, store.relative_folder_path.as_deref())?)?;
  validate_upload_and_retention(rules, kind, DESTINATION, None, store.data_deletion_age_in_days.as_deref())?;
  validate_level_filter(rules, kind, DESTINATION, store.level_filter.as_deref())?;
  validate_parameters(rules, DESTINATION, &store.parameters)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  use crate::manifest::{DiagnosticSource, EtwDiagnostics, FolderSource, PackageDescription};

  fn instance() -> Rules<'static> {
    Rules::new(ValidationMode::Instance, None)
  }

  fn etw_with(destinations: Destinations) -> Diagnostics {
    Diagnostics {
      etw_source: Some(DiagnosticSource {
        is_enabled: Some("true".into()),
        destinations,
        parameters: vec![],
      }),
      ..Default::default()
    }
  }

  fn blob() -> AzureBlobDestination {
    AzureBlobDestination {
      is_enabled: Some("true".into()),
      connection_string: Some("DefaultEndpointsProtocol=https;AccountName=x".into()),
      upload_interval_in_minutes: Some("5".into()),
      data_deletion_age_in_days: Some("7".into()),
      level_filter: Some("Informational".into()),
      ..Default::default()
    }
  }

  #[test]
  fn valid_etw_blob_passes() {
    let diagnostics = etw_with(Destinations {
      azure_blobs: vec![blob()],
      ..Default::default()
    });
    assert!(validate_application_diagnostics(&instance(), &diagnostics).is_ok());
  }

  #[test]
  fn zero_upload_interval_names_source_and_destination() {
    let diagnostics = etw_with(Destinations {
      azure_blobs: vec![AzureBlobDestination {
        upload_interval_in_minutes: Some("0".into()),
        ..blob()
      }],
      ..Default::default()
    });

    match validate_application_diagnostics(&instance(), &diagnostics).unwrap_err() {
      ValidationError::ValueMustBeGreaterThanZero { at, value } => {
        assert_eq!(at.element, "ETWSource");
        assert_eq!(at.destination.as_deref(), Some("AzureBlob"));
        assert_eq!(at.attribute, "UploadIntervalInMinutes");
        assert_eq!(value, "0");
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn level_filter_must_be_known_for_etw() {
    let diagnostics = etw_with(Destinations {
      azure_blobs: vec![AzureBlobDestination {
        level_filter: Some("Chatty".into()),
        ..blob()
      }],
      ..Default::default()
    });
    assert_eq!(
      validate_application_diagnostics(&instance(), &diagnostics)
        .unwrap_err()
        .kind(),
      ErrorKind::InvalidEnumValue
    );
  }

  #[test]
  fn level_filter_rejected_outside_etw() {
    let diagnostics = Diagnostics {
      crash_dump_source: Some(DiagnosticSource {
        destinations: Destinations {
          azure_blobs: vec![blob()],
          ..Default::default()
        },
        ..Default::default()
      }),
      ..Default::default()
    };
    assert_eq!(
      validate_application_diagnostics(&instance(), &diagnostics)
        .unwrap_err()
        .kind(),
      ErrorKind::AttributeInvalid
    );
  }

  #[test]
  fn local_store_path_must_stay_relative() {
    let local = |path: &str| {
      etw_with(Destinations {
        local_stores: vec![LocalStoreDestination {
          relative_folder_path: Some(path.into()),
          ..Default::default()
        }],
        ..Default::default()
      })
    };
    assert!(validate_application_diagnostics(&instance(), &local("logs/etw")).is_ok());
    assert_eq!(
      validate_application_diagnostics(&instance(), &local("logs/../../etc"))
        .unwrap_err()
        .kind(),
      ErrorKind::InvalidRelativePath
    );
    assert_eq!(
      validate_application_diagnostics(&instance(), &local("/var/log"))
        .unwrap_err()
        .kind(),
      ErrorKind::AbsolutePathNotAllowed
    );
  }

  #[test]
  fn file_store_managed_account_forbids_password() {
    let diagnostics = etw_with(Destinations {
      file_stores: vec![FileStoreDestination {
        path: Some("file://server/share".into()),
        account_type: Some("ManagedServiceAccount".into()),
        account_name: Some("CONTOSO\\gmsa$".into()),
        password: Some("secret".into()),
        ..Default::default()
      }],
      ..Default::default()
    });
    match validate_application_diagnostics(&instance(), &diagnostics).unwrap_err() {
      ValidationError::PasswordAttributeInvalid {
        at,
        discriminator_value,
        required,
        ..
      } => {
        assert_eq!(at.attribute, "Password");
        assert_eq!(discriminator_value, "ManagedServiceAccount");
        assert!(!required);
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn file_store_domain_user_requires_password_and_valid_name() {
    let store = FileStoreDestination {
      path: Some("file://server/share".into()),
      account_type: Some("domainuser".into()),
      account_name: Some("CONTOSO\\svc".into()),
      ..Default::default()
    };
    let missing_password = etw_with(Destinations {
      file_stores: vec![store.clone()],
      ..Default::default()
    });
    assert_eq!(
      validate_application_diagnostics(&instance(), &missing_password)
        .unwrap_err()
        .kind(),
      ErrorKind::PasswordAttributeInvalid
    );

    let bad_name = etw_with(Destinations {
      file_stores: vec![FileStoreDestination {
        account_name: Some("svc".into()),
        password: Some("pw".into()),
        ..store
      }],
      ..Default::default()
    });
    assert_eq!(
      validate_application_diagnostics(&instance(), &bad_name)
        .unwrap_err()
        .kind(),
      ErrorKind::InvalidAccountNameFormat
    );
  }

  #[test]
  fn file_store_path_must_be_uri() {
    let diagnostics = etw_with(Destinations {
      file_stores: vec![FileStoreDestination {
        path: Some("not a uri".into()),
        ..Default::default()
      }],
      ..Default::default()
    });
    assert_eq!(
      validate_application_diagnostics(&instance(), &diagnostics)
        .unwrap_err()
        .kind(),
      ErrorKind::PathNotValidUri
    );
  }

  #[test]
  fn type_level_skips_parameterized_values() {
    let rules = Rules::new(ValidationMode::Type, Some("ApplicationManifest.json"));
    let diagnostics = Diagnostics {
      folder_sources: vec![FolderSource {
        relative_folder_path: Some("[LogFolder]".into()),
        data_deletion_age_in_days: Some("[Retention]".into()),
        ..Default::default()
      }],
      ..etw_with(Destinations {
        azure_blobs: vec![AzureBlobDestination {
          upload_interval_in_minutes: Some("[Interval]".into()),
          ..blob()
        }],
        ..Default::default()
      })
    };
    assert!(validate_application_diagnostics(&rules, &diagnostics).is_ok());
    assert!(validate_application_diagnostics(&instance(), &diagnostics).is_err());
  }

  #[test]
  fn duplicate_folder_sources_rejected() {
    let folder = FolderSource {
      relative_folder_path: Some("Logs".into()),
      ..Default::default()
    };
    let diagnostics = Diagnostics {
      folder_sources: vec![
        folder.clone(),
        FolderSource {
          relative_folder_path: Some("logs".into()),
          ..folder
        },
      ],
      ..Default::default()
    };
    assert_eq!(
      validate_application_diagnostics(&instance(), &diagnostics)
        .unwrap_err()
        .kind(),
      ErrorKind::DuplicateElementFound
    );
  }

  #[test]
  fn duplicate_source_parameters_rejected() {
    let diagnostics = Diagnostics {
      etw_source: Some(DiagnosticSource {
        parameters: vec![
          DiagnosticParameter {
            name: "Provider".into(),
            value: "a".into(),
          },
          DiagnosticParameter {
            name: "provider".into(),
            value: "b".into(),
          },
        ],
        ..Default::default()
      }),
      ..Default::default()
    };
    assert_eq!(
      validate_application_diagnostics(&instance(), &diagnostics)
        .unwrap_err()
        .kind(),
      ErrorKind::DuplicateElementFound
    );
  }

  #[test]
  fn manifest_data_package_version_must_parse() {
    let diagnostics = |version: &str| ServiceDiagnostics {
      etw: Some(EtwDiagnostics {
        provider_guids: vec![],
        manifest_data_packages: vec![PackageDescription {
          name: "EtwManifests".into(),
          version: version.into(),
          ..Default::default()
        }],
      }),
    };
    assert!(validate_service_diagnostics(&instance(), &diagnostics("1.0.0")).is_ok());
    assert_eq!(
      validate_service_diagnostics(&instance(), &diagnostics("one"))
        .unwrap_err()
        .kind(),
      ErrorKind::InvalidVersionFormat
    );
  }
}
