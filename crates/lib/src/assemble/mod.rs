//! Application type and instance assembly.
//!
//! [`InstanceAssembler`] drives every public operation through the same
//! linear pipeline, all under one [`Deadline`]:
//!
//! ```text
//! fetch type closure -> resolve parameters -> build instance graph
//!   -> canonicalize -> validate -> persist
//! ```
//!
//! Any stage failure aborts the operation with the originating error.
//! Documents already uploaded are not rolled back; re-running with the same
//! inputs regenerates byte-identical documents, so a retry is safe.

mod delete;
mod fetch;
mod instance;
mod persist;
mod provision;
mod query;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use url::Url;

use crate::canonical::Canonical;
use crate::config::BuilderConfig;
use crate::consts::{APPLICATION_NAME_SCHEME, MOCK_APPLICATION_ID, MOCK_APPLICATION_NAME};
use crate::context::{ApplicationInstanceContext, ApplicationTypeContext, ChecksumConflict};
use crate::deadline::{Deadline, DeadlineExceeded};
use crate::error::ErrorKind;
use crate::manifest::ApplicationInstance;
use crate::params::{ParameterError, ParameterOverrides, resolve};
use crate::progress::{ProgressReporter, ProgressStage, ProgressStatus};
use crate::store::{ArtifactStore, StoreError, StoreLayout, get_json};
use crate::util::hash::DirHashError;
use crate::validate::{TypeFlags, ValidationError, ValidatorRegistry};
use crate::version::VersionError;

pub use delete::DeleteSummary;
pub use instance::InstanceIdentity;
pub use persist::{PersistOptions, PersistSummary};
pub use provision::{ProvisionOptions, ProvisionResult};
pub use query::ApplicationTypeInfo;

#[derive(Debug, Error)]
pub enum AssembleError {
  #[error("invalid {argument}: {reason}")]
  InvalidArgument { argument: &'static str, reason: String },

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Parameter(#[from] ParameterError),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Deadline(#[from] DeadlineExceeded),

  #[error(transparent)]
  Version(#[from] VersionError),

  #[error("failed to checksum {item}: {source}")]
  Checksum {
    item: String,
    #[source]
    source: serde_json::Error,
  },

  #[error(transparent)]
  DirectoryHash(#[from] DirHashError),

  #[error("failed to read {path}: {source}")]
  LocalRead {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  LocalParse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write {path}: {source}")]
  LocalWrite {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A different file already exists in the output directory.
  #[error("{path} already exists with different content")]
  OutputExists { path: PathBuf },

  /// Recorded checksums disagree with provisioned content.
  #[error("{} checksum conflict(s), first: {}", .conflicts.len(), first_conflict(.conflicts))]
  ChecksumConflict { conflicts: Vec<ChecksumConflict> },

  #[error("task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

fn first_conflict(conflicts: &[ChecksumConflict]) -> String {
  conflicts
    .first()
    .map(|c| format!("{} (recorded {}, computed {})", c.item, c.recorded, c.computed))
    .unwrap_or_default()
}

impl AssembleError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      AssembleError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
      AssembleError::Store(e) => e.kind(),
      AssembleError::Parameter(e) => e.kind(),
      AssembleError::Validation(e) => e.kind(),
      AssembleError::Deadline(_) => ErrorKind::DeadlineExceeded,
      AssembleError::Version(e) => e.kind(),
      AssembleError::Checksum { .. } | AssembleError::LocalWrite { .. } | AssembleError::OutputExists { .. } => {
        ErrorKind::StoreWriteFailure
      }
      AssembleError::DirectoryHash(_) | AssembleError::LocalRead { .. } | AssembleError::LocalParse { .. } => {
        ErrorKind::StoreReadFailure
      }
      AssembleError::ChecksumConflict { .. } => ErrorKind::ChecksumConflict,
      AssembleError::Task(_) => ErrorKind::TaskFailed,
    }
  }
}

/// Arguments of [`InstanceAssembler::create_application`].
#[derive(Debug, Clone, Default)]
pub struct CreateApplicationRequest {
  pub type_name: String,
  pub type_version: String,
  pub application_id: String,
  /// A `fabric:/...` URI.
  pub application_name: String,
  pub parameters: ParameterOverrides,
  pub flags: TypeFlags,
  pub persist: PersistOptions,
}

/// Arguments of [`InstanceAssembler::upgrade_application`].
#[derive(Debug, Clone, Default)]
pub struct UpgradeApplicationRequest {
  pub type_name: String,
  pub target_type_version: String,
  pub application_id: String,
  pub application_name: String,
  /// Instance version currently deployed; the upgrade produces the next one.
  pub current_instance_version: u64,
  pub parameters: ParameterOverrides,
  pub flags: TypeFlags,
  pub persist: PersistOptions,
}

/// An assembled instance together with what persisting it produced.
#[derive(Debug, Clone)]
pub struct AssembledApplication {
  pub context: ApplicationInstanceContext,
  pub persisted: PersistSummary,
}

pub struct InstanceAssembler {
  store: Arc<dyn ArtifactStore>,
  validators: ValidatorRegistry,
  progress: Option<ProgressReporter>,
}

impl InstanceAssembler {
  pub fn new(store: Arc<dyn ArtifactStore>, config: &BuilderConfig) -> Self {
    Self {
      store,
      validators: ValidatorRegistry::standard(config),
      progress: None,
    }
  }

  pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
    self.progress = Some(progress);
    self
  }

  pub fn store(&self) -> &Arc<dyn ArtifactStore> {
    &self.store
  }

  pub fn validators(&self) -> &ValidatorRegistry {
    &self.validators
  }

  fn report(&self, stage: ProgressStage, completed: usize, total: usize) {
    if let Some(progress) = &self.progress {
      progress.report(ProgressStatus::new(stage, completed as u64, total as u64));
    }
  }

  /// Fetch an application type from the store and validate it at type level.
  ///
  /// Never writes to the store.
  pub async fn build_application_type(
    &self,
    type_name: &str,
    type_version: &str,
    flags: TypeFlags,
    deadline: Deadline,
  ) -> Result<ApplicationTypeContext, AssembleError> {
    require("application type name", type_name)?;
    require("application type version", type_version)?;
    info!(application_type = type_name, version = type_version, "building application type");

    let context = self.fetch_type(type_name, type_version, deadline).await?;
    self.report(ProgressStage::Validating, 0, 1);
    self.validators.validate_type(&context, flags)?;
    Ok(context)
  }

  /// Create a new application instance at instance version 1.
  pub async fn create_application(
    &self,
    request: CreateApplicationRequest,
    deadline: Deadline,
  ) -> Result<AssembledApplication, AssembleError> {
    require("application type name", &request.type_name)?;
    require("application type version", &request.type_version)?;
    require("application id", &request.application_id)?;
    validate_application_name(&request.application_name)?;
    info!(
      application_type = %request.type_name,
      version = %request.type_version,
      application = %request.application_name,
      "creating application"
    );

    let identity = InstanceIdentity {
      application_id: request.application_id,
      application_name: request.application_name,
      instance_version: 1,
    };
    let context = self
      .assemble(
        &request.type_name,
        &request.type_version,
        &request.parameters,
        request.flags,
        identity,
        None,
        deadline,
      )
      .await?;
    let persisted = self.persist(&context, &request.persist, deadline).await?;
    Ok(AssembledApplication { context, persisted })
  }

  /// Assemble and validate an instance under a placeholder identity without persisting it.
  pub async fn validate_application(
    &self,
    type_name: &str,
    type_version: &str,
    parameters: &ParameterOverrides,
    deadline: Deadline,
  ) -> Result<ApplicationInstanceContext, AssembleError> {
    require("application type name", type_name)?;
    require("application type version", type_version)?;
    info!(application_type = type_name, version = type_version, "validating application");

    let identity = InstanceIdentity {
      application_id: MOCK_APPLICATION_ID.to_string(),
      application_name: MOCK_APPLICATION_NAME.to_string(),
      instance_version: 1,
    };
    self
      .assemble(type_name, type_version, parameters, TypeFlags::default(), identity, None, deadline)
      .await
  }

  /// Build the next instance version of an existing application.
  ///
  /// Packages whose content did not change keep their rollout version.
  pub async fn upgrade_application(
    &self,
    request: UpgradeApplicationRequest,
    deadline: Deadline,
  ) -> Result<AssembledApplication, AssembleError> {
    require("application type name", &request.type_name)?;
    require("target application type version", &request.target_type_version)?;
    require("application id", &request.application_id)?;
    validate_application_name(&request.application_name)?;
    if request.current_instance_version == 0 {
      return Err(AssembleError::InvalidArgument {
        argument: "current instance version",
        reason: "must be at least 1".to_string(),
      });
    }
    info!(
      application = %request.application_name,
      current_instance = request.current_instance_version,
      target_version = %request.target_type_version,
      "upgrading application"
    );

    let key = StoreLayout::application_instance(
      &request.type_name,
      &request.application_id,
      request.current_instance_version,
    );
    let current: ApplicationInstance = get_json(self.store.as_ref(), &key, deadline).await?;
    if current.application_name != request.application_name {
      return Err(AssembleError::InvalidArgument {
        argument: "application name",
        reason: format!(
          "instance {} belongs to '{}', not '{}'",
          current.instance_version, current.application_name, request.application_name
        ),
      });
    }
    let previous = instance::PreviousRollouts::fetch(&self.store, &current, deadline).await?;

    let identity = InstanceIdentity {
      application_id: request.application_id,
      application_name: request.application_name,
      instance_version: current.instance_version + 1,
    };
    let context = self
      .assemble(
        &request.type_name,
        &request.target_type_version,
        &request.parameters,
        request.flags,
        identity,
        Some(&previous),
        deadline,
      )
      .await?;
    let persisted = self.persist(&context, &request.persist, deadline).await?;
    Ok(AssembledApplication { context, persisted })
  }

  /// Read a local build layout, validate it and upload what the store lacks.
  pub async fn provision_application_type(
    &self,
    layout_dir: impl Into<PathBuf>,
    options: ProvisionOptions,
    deadline: Deadline,
  ) -> Result<ProvisionResult, AssembleError> {
    provision::provision(self, layout_dir.into(), options, deadline).await
  }

  /// Name, version, parameters and imports declared by a local build layout.
  pub async fn get_application_type_info(&self, layout_dir: &Path) -> Result<ApplicationTypeInfo, AssembleError> {
    query::application_type_info(layout_dir).await
  }

  /// Download the manifests of a provisioned type into `output_dir`.
  pub async fn get_manifests(
    &self,
    type_name: &str,
    type_version: &str,
    output_dir: &Path,
    overwrite: bool,
    deadline: Deadline,
  ) -> Result<Vec<PathBuf>, AssembleError> {
    require("application type name", type_name)?;
    require("application type version", type_version)?;
    query::download_manifests(self, type_name, type_version, output_dir, overwrite, deadline).await
  }

  /// Remove one instance version and the packages no neighbouring version shares.
  pub async fn delete_application_instance(
    &self,
    type_name: &str,
    application_id: &str,
    instance_version: u64,
    deadline: Deadline,
  ) -> Result<DeleteSummary, AssembleError> {
    require("application type name", type_name)?;
    require("application id", application_id)?;
    deadline.check("delete application instance")?;
    delete::delete_instance(self, type_name, application_id, instance_version, deadline).await
  }

  async fn fetch_type(
    &self,
    type_name: &str,
    type_version: &str,
    deadline: Deadline,
  ) -> Result<ApplicationTypeContext, AssembleError> {
    fetch::fetch_type_closure(self, type_name, type_version, deadline).await
  }

  #[allow(clippy::too_many_arguments)]
  async fn assemble(
    &self,
    type_name: &str,
    type_version: &str,
    parameters: &ParameterOverrides,
    flags: TypeFlags,
    identity: InstanceIdentity,
    previous: Option<&instance::PreviousRollouts>,
    deadline: Deadline,
  ) -> Result<ApplicationInstanceContext, AssembleError> {
    let type_context = self.fetch_type(type_name, type_version, deadline).await?;
    self.report(ProgressStage::Validating, 0, 2);
    self.validators.validate_type(&type_context, flags)?;

    deadline.check("resolve parameters")?;
    let resolved = resolve(parameters, type_context.declared_parameters())?;

    deadline.check("build instance graph")?;
    let context = instance::build_instance(&type_context, identity, resolved, previous)?.canonicalize();

    self.report(ProgressStage::Validating, 1, 2);
    self.validators.validate_instance(&context)?;
    info!(
      application = %context.instance.application_name,
      instance_version = context.instance.instance_version,
      service_packages = context.service_packages.len(),
      "application instance assembled"
    );
    Ok(context)
  }

  async fn persist(
    &self,
    context: &ApplicationInstanceContext,
    options: &PersistOptions,
    deadline: Deadline,
  ) -> Result<PersistSummary, AssembleError> {
    deadline.check("persist application instance")?;
    persist::persist(self, context, options, deadline).await
  }
}

/// Wait for every task in `join_set`, then fail with the first error seen.
///
/// Tasks that are still running when one fails are allowed to finish; no
/// partial result is returned. `on_complete` receives the number of tasks
/// that succeeded so far.
async fn join_all<T: Send + 'static>(
  mut join_set: JoinSet<Result<T, AssembleError>>,
  mut on_complete: impl FnMut(usize),
) -> Result<Vec<T>, AssembleError> {
  let mut results = Vec::with_capacity(join_set.len());
  let mut first_error = None;

  while let Some(joined) = join_set.join_next().await {
    let outcome = joined.map_err(|e| {
      error!(error = %e, "task panicked");
      AssembleError::from(e)
    });
    match outcome.and_then(|result| result) {
      Ok(value) => {
        results.push(value);
        on_complete(results.len());
      }
      Err(e) if first_error.is_none() => first_error = Some(e),
      Err(e) => debug!(error = %e, "additional failure while draining tasks"),
    }
  }

  match first_error {
    Some(e) => Err(e),
    None => Ok(results),
  }
}

fn require(argument: &'static str, value: &str) -> Result<(), AssembleError> {
  if value.trim().is_empty() {
    return Err(AssembleError::InvalidArgument {
      argument,
      reason: "must not be empty".to_string(),
    });
  }
  Ok(())
}

fn validate_application_name(name: &str) -> Result<(), AssembleError> {
  let invalid = |reason: &str| AssembleError::InvalidArgument {
    argument: "application name",
    reason: format!("'{}' {}", name, reason),
  };
  let url = Url::parse(name).map_err(|_| invalid("is not a URI"))?;
  if url.scheme() != APPLICATION_NAME_SCHEME {
    return Err(invalid("must use the fabric: scheme"));
  }
  if url.path().trim_matches('/').is_empty() {
    return Err(invalid("must name an application"));
  }
  Ok(())
}
