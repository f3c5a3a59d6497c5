//! Implementation of the `ib delete` command.

use anyhow::Result;

use super::{CommandContext, KindContext};
use crate::output::{print_json, print_stat, print_success};

pub fn cmd_delete(ctx: &CommandContext, type_name: &str, application_id: &str, instance_version: u64) -> Result<()> {
  let rt = ctx.runtime()?;
  let summary = rt.block_on(async {
    let (assembler, _) = ctx.assembler();
    assembler
      .delete_application_instance(type_name, application_id, instance_version, ctx.deadline())
      .await
      .kind_context(format!("Deleting {} instance {} failed", application_id, instance_version))
  })?;

  if ctx.format.is_json() {
    return print_json(&serde_json::json!({
      "deleted": summary.deleted,
      "retained": summary.retained,
    }));
  }
  print_success(&format!("Deleted {} instance {}", application_id, instance_version));
  print_stat("Deleted", &summary.deleted.len().to_string());
  if !summary.retained.is_empty() {
    print_stat("Retained", &summary.retained.len().to_string());
  }
  Ok(())
}
