//! Implementation of the `ib validate` command.

use anyhow::Result;

use super::{CommandContext, KindContext};
use crate::output::{print_json, print_stat, print_success};

pub fn cmd_validate(
  ctx: &CommandContext,
  type_name: &str,
  type_version: &str,
  parameters: Vec<(String, String)>,
) -> Result<()> {
  let rt = ctx.runtime()?;
  let context = rt.block_on(async {
    let (assembler, progress) = ctx.assembler();
    let context = assembler
      .validate_application(type_name, type_version, &parameters, ctx.deadline())
      .await
      .kind_context(format!("Validating {} {} failed", type_name, type_version));
    if let Some(progress) = progress {
      progress.flush().await;
    }
    context
  })?;

  if ctx.format.is_json() {
    return print_json(&context.instance.parameters);
  }
  print_success(&format!("{} {} is valid", type_name, type_version));
  for (name, value) in &context.instance.parameters {
    print_stat(name, value);
  }
  Ok(())
}
