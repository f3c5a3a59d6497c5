//! Implementation of the `ib provision` command.

use std::path::PathBuf;

use anyhow::Result;

use imagebuilder_lib::assemble::ProvisionOptions;
use imagebuilder_lib::validate::TypeFlags;

use super::{CommandContext, KindContext};
use crate::output::{print_json, print_stat, print_success, print_warning, truncate_hash};

pub struct ProvisionArgs {
  pub layout: PathBuf,
  pub fail_on_conflict: bool,
  pub compose: bool,
  pub record_progress: bool,
}

pub fn cmd_provision(ctx: &CommandContext, args: ProvisionArgs) -> Result<()> {
  let layout = args.layout;
  let options = ProvisionOptions {
    fail_on_conflict: args.fail_on_conflict,
    record_progress: args.record_progress,
    flags: TypeFlags {
      compose_deployment: args.compose,
    },
  };

  let rt = ctx.runtime()?;
  let result = rt.block_on(async {
    let (assembler, progress) = ctx.assembler();
    let result = assembler
      .provision_application_type(&layout, options, ctx.deadline())
      .await
      .kind_context(format!("Provisioning {} failed", layout.display()));
    if let Some(progress) = progress {
      progress.flush().await;
    }
    result
  })?;

  let type_name = result.context.type_name();
  let type_version = result.context.type_version();
  if ctx.format.is_json() {
    let conflicts: Vec<_> = result
      .conflicts
      .iter()
      .map(|c| serde_json::json!({ "item": c.item, "recorded": c.recorded.0, "computed": c.computed.0 }))
      .collect();
    print_json(&serde_json::json!({
      "application_type": type_name,
      "version": type_version,
      "uploaded": result.uploaded,
      "skipped": result.skipped,
      "conflicts": conflicts,
    }))?;
    return Ok(());
  }

  print_success(&format!("Provisioned {} {}", type_name, type_version));
  print_stat("Uploaded", &result.uploaded.len().to_string());
  print_stat("Skipped", &result.skipped.len().to_string());
  for conflict in &result.conflicts {
    print_warning(&format!(
      "Checksum conflict on {}: recorded {}, computed {}",
      conflict.item,
      truncate_hash(&conflict.recorded.0),
      truncate_hash(&conflict.computed.0)
    ));
  }
  Ok(())
}
