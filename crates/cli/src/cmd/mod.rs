//! Subcommand implementations.
//!
//! Every command builds its own tokio runtime, runs one library operation
//! under a fresh deadline and prints a short summary.

mod build_type;
mod cluster;
mod create;
mod delete;
mod provision;
mod query;
mod upgrade;
mod validate;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use owo_colors::{OwoColorize, Stream};

use imagebuilder_lib::config::BuilderConfig;
use imagebuilder_lib::progress::{ProgressReporter, ProgressSink, ProgressStatus};
use imagebuilder_lib::store::{ArtifactStore, FsStore, StoreError};
use imagebuilder_lib::upgrade::UpgradeError;
use imagebuilder_lib::{AssembleError, Deadline, ErrorKind, InstanceAssembler};

use crate::output::OutputFormat;

pub use build_type::cmd_build_type;
pub use cluster::cmd_cluster_upgrade;
pub use create::{CreateArgs, cmd_create};
pub use delete::cmd_delete;
pub use provision::{ProvisionArgs, cmd_provision};
pub use query::{cmd_get_manifests, cmd_type_info};
pub use upgrade::{UpgradeArgs, cmd_upgrade};
pub use validate::cmd_validate;

/// Settings shared by every command.
pub struct CommandContext {
  pub config: BuilderConfig,
  pub format: OutputFormat,
  pub verbose: bool,
}

impl CommandContext {
  pub fn new(config: BuilderConfig, format: OutputFormat, verbose: bool) -> Self {
    Self { config, format, verbose }
  }

  pub fn runtime(&self) -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create async runtime")
  }

  /// Must be called inside the runtime the operation runs on.
  pub fn deadline(&self) -> Deadline {
    Deadline::after(self.config.default_timeout)
  }

  pub fn store(&self) -> Arc<dyn ArtifactStore> {
    Arc::new(FsStore::new(&self.config.store_root))
  }

  /// An assembler over the file-system store, printing progress when verbose.
  pub fn assembler(&self) -> (InstanceAssembler, Option<ProgressReporter>) {
    let assembler = InstanceAssembler::new(self.store(), &self.config);
    if !self.verbose {
      return (assembler, None);
    }
    let progress = ProgressReporter::new(Arc::new(TerminalProgress));
    (assembler.with_progress(progress.clone()), Some(progress))
  }
}

/// Prints progress updates to stderr.
struct TerminalProgress;

#[async_trait]
impl ProgressSink for TerminalProgress {
  async fn write(&self, status: ProgressStatus) -> Result<(), StoreError> {
    eprintln!("{}", status.if_supports_color(Stream::Stderr, |s| s.dimmed()));
    Ok(())
  }
}

/// Library errors that can name their [`ErrorKind`].
pub trait KindedError: std::error::Error + Send + Sync + 'static {
  fn error_kind(&self) -> ErrorKind;
}

impl KindedError for AssembleError {
  fn error_kind(&self) -> ErrorKind {
    self.kind()
  }
}

impl KindedError for UpgradeError {
  fn error_kind(&self) -> ErrorKind {
    self.kind()
  }
}

pub trait KindContext<T> {
  /// Attach `what failed [Kind]` to a library error.
  fn kind_context<D: fmt::Display>(self, what: D) -> Result<T>;
}

impl<T, E: KindedError> KindContext<T> for std::result::Result<T, E> {
  fn kind_context<D: fmt::Display>(self, what: D) -> Result<T> {
    self.map_err(|e| {
      let kind = e.error_kind();
      anyhow::Error::new(e).context(format!("{} [{}]", what, kind))
    })
  }
}
