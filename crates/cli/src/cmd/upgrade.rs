//! Implementation of the `ib upgrade` command.

use std::time::Instant;

use anyhow::Result;

use imagebuilder_lib::assemble::UpgradeApplicationRequest;

use super::{CommandContext, KindContext};
use crate::output::{print_instance_summary, print_json};

pub struct UpgradeArgs {
  pub type_name: String,
  pub target_type_version: String,
  pub application_id: String,
  pub application_name: String,
  pub current_instance_version: u64,
  pub parameters: Vec<(String, String)>,
}

pub fn cmd_upgrade(ctx: &CommandContext, args: UpgradeArgs) -> Result<()> {
  let what = format!(
    "Upgrading {} to {} {} failed",
    args.application_name, args.type_name, args.target_type_version
  );
  let request = UpgradeApplicationRequest {
    type_name: args.type_name,
    target_type_version: args.target_type_version,
    application_id: args.application_id,
    application_name: args.application_name,
    current_instance_version: args.current_instance_version,
    parameters: args.parameters,
    ..Default::default()
  };

  let start = Instant::now();
  let rt = ctx.runtime()?;
  let upgraded = rt.block_on(async {
    let (assembler, progress) = ctx.assembler();
    let upgraded = assembler.upgrade_application(request, ctx.deadline()).await.kind_context(what);
    if let Some(progress) = progress {
      progress.flush().await;
    }
    upgraded
  })?;

  if ctx.format.is_json() {
    return print_json(&upgraded.context.instance);
  }
  print_instance_summary("Upgraded", &upgraded.context, &upgraded.persisted, start.elapsed());
  Ok(())
}
