mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imagebuilder_lib::config::BuilderConfig;
use tracing_subscriber::EnvFilter;

use cmd::CommandContext;
use output::OutputFormat;

/// ib - application image builder
#[derive(Parser)]
#[command(name = "ib")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Root directory of the artifact store (overrides IMAGEBUILDER_STORE)
  #[arg(long, global = true)]
  store: Option<PathBuf>,

  /// Time budget for the whole operation, e.g. `90s` or `10m` (plain numbers are seconds)
  #[arg(long, global = true, value_parser = parse_timeout)]
  timeout: Option<Duration>,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Provision an application type from a local build layout
  Provision {
    /// Directory holding ApplicationManifest.json and one directory per service manifest
    layout: PathBuf,

    /// Fail instead of skipping items whose recorded checksum differs
    #[arg(long)]
    fail_on_conflict: bool,

    /// The type was generated from a compose deployment
    #[arg(long)]
    compose: bool,

    /// Keep the latest provisioning status in the store next to the application manifest
    #[arg(long)]
    record_progress: bool,
  },

  /// Show the application type a local build layout declares
  TypeInfo {
    /// Directory holding ApplicationManifest.json
    layout: PathBuf,
  },

  /// Download the manifests of a provisioned application type
  GetManifests {
    type_name: String,
    type_version: String,

    /// Directory to write the manifests to, laid out like the store
    #[arg(long)]
    output: PathBuf,

    /// Replace files that already exist with different content
    #[arg(long)]
    overwrite: bool,
  },

  /// Delete one application instance version and the packages only it uses
  Delete {
    type_name: String,
    application_id: String,
    instance_version: u64,
  },

  /// Fetch and validate an application type already in the store
  BuildType {
    type_name: String,
    type_version: String,
  },

  /// Create a new application instance
  Create {
    type_name: String,
    type_version: String,
    application_id: String,
    /// Application name, a fabric:/ URI
    application_name: String,

    /// Parameter override, may be repeated
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_parameter)]
    parameters: Vec<(String, String)>,

    /// Also write the generated documents below this directory
    #[arg(long)]
    output: Option<PathBuf>,

    /// Do not upload the generated documents to the store
    #[arg(long)]
    no_upload: bool,

    /// Replace documents that already exist with different content
    #[arg(long)]
    overwrite: bool,
  },

  /// Build the next instance version of an application
  Upgrade {
    type_name: String,
    target_type_version: String,
    application_id: String,
    application_name: String,

    /// Instance version currently deployed
    #[arg(long = "current", value_name = "INSTANCE_VERSION")]
    current_instance_version: u64,

    /// Parameter override, may be repeated
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_parameter)]
    parameters: Vec<(String, String)>,
  },

  /// Assemble and validate an instance without persisting it
  Validate {
    type_name: String,
    type_version: String,

    /// Parameter override, may be repeated
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_parameter)]
    parameters: Vec<(String, String)>,
  },

  /// Decide whether a cluster upgrade only changes configuration
  ClusterUpgrade {
    /// Current cluster version (CODE:CONFIG or Invalid)
    current: String,
    /// Target cluster version (CODE:CONFIG)
    target: String,

    /// Record the result document in the store
    #[arg(long)]
    write_result: bool,
  },
}

fn parse_parameter(value: &str) -> Result<(String, String), String> {
  let (name, value) = value
    .split_once('=')
    .ok_or_else(|| format!("'{}' is not NAME=VALUE", value))?;
  if name.trim().is_empty() {
    return Err("parameter name must not be empty".to_string());
  }
  Ok((name.to_string(), value.to_string()))
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
  let duration = match value.parse::<u64>() {
    Ok(secs) => Duration::from_secs(secs),
    Err(_) => humantime::parse_duration(value).map_err(|e| e.to_string())?,
  };
  if duration.is_zero() {
    return Err("timeout must be greater than zero".to_string());
  }
  Ok(duration)
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let mut config = BuilderConfig::from_env().context("Invalid environment configuration")?;
  if let Some(store) = cli.store {
    config = config.with_store_root(store);
  }
  if let Some(timeout) = cli.timeout {
    config = config.with_default_timeout(timeout);
  }
  let ctx = CommandContext::new(config, cli.format, cli.verbose);

  match cli.command {
    Commands::Provision {
      layout,
      fail_on_conflict,
      compose,
      record_progress,
    } => cmd::cmd_provision(
      &ctx,
      cmd::ProvisionArgs {
        layout,
        fail_on_conflict,
        compose,
        record_progress,
      },
    ),
    Commands::TypeInfo { layout } => cmd::cmd_type_info(&ctx, &layout),
    Commands::GetManifests {
      type_name,
      type_version,
      output,
      overwrite,
    } => cmd::cmd_get_manifests(&ctx, &type_name, &type_version, output, overwrite),
    Commands::Delete {
      type_name,
      application_id,
      instance_version,
    } => cmd::cmd_delete(&ctx, &type_name, &application_id, instance_version),
    Commands::BuildType {
      type_name,
      type_version,
    } => cmd::cmd_build_type(&ctx, &type_name, &type_version),
    Commands::Create {
      type_name,
      type_version,
      application_id,
      application_name,
      parameters,
      output,
      no_upload,
      overwrite,
    } => cmd::cmd_create(
      &ctx,
      cmd::CreateArgs {
        type_name,
        type_version,
        application_id,
        application_name,
        parameters,
        output,
        upload: !no_upload,
        overwrite,
      },
    ),
    Commands::Upgrade {
      type_name,
      target_type_version,
      application_id,
      application_name,
      current_instance_version,
      parameters,
    } => cmd::cmd_upgrade(
      &ctx,
      cmd::UpgradeArgs {
        type_name,
        target_type_version,
        application_id,
        application_name,
        current_instance_version,
        parameters,
      },
    ),
    Commands::Validate {
      type_name,
      type_version,
      parameters,
    } => cmd::cmd_validate(&ctx, &type_name, &type_version, parameters),
    Commands::ClusterUpgrade {
      current,
      target,
      write_result,
    } => cmd::cmd_cluster_upgrade(&ctx, &current, &target, write_result),
  }
}
