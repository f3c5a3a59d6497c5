//! Implementation of the `ib build-type` command.

use anyhow::Result;

use super::{CommandContext, KindContext};
use crate::output::{print_json, print_stat, print_success, print_warning};

pub fn cmd_build_type(ctx: &CommandContext, type_name: &str, type_version: &str) -> Result<()> {
  let rt = ctx.runtime()?;
  let context = rt.block_on(async {
    let (assembler, progress) = ctx.assembler();
    let context = assembler
      .build_application_type(type_name, type_version, Default::default(), ctx.deadline())
      .await
      .kind_context(format!("Building {} {} failed", type_name, type_version));
    if let Some(progress) = progress {
      progress.flush().await;
    }
    context
  })?;

  let conflicts = context.checksum_conflicts();
  if ctx.format.is_json() {
    let manifests: Vec<_> = context
      .service_manifests
      .iter()
      .map(|sm| serde_json::json!({ "name": sm.manifest.name, "version": sm.manifest.version, "checksum": sm.checksum.0 }))
      .collect();
    print_json(&serde_json::json!({
      "application_type": type_name,
      "version": type_version,
      "service_manifests": manifests,
      "conflicts": conflicts.len(),
    }))?;
    return Ok(());
  }

  print_success(&format!("{} {} is valid", type_name, type_version));
  print_stat("Service manifests", &context.service_manifests.len().to_string());
  print_stat("Parameters", &context.declared_parameters().len().to_string());
  for conflict in &conflicts {
    print_warning(&format!("Checksum conflict on {}", conflict.item));
  }
  Ok(())
}
