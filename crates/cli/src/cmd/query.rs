//! Implementation of the `ib type-info` and `ib get-manifests` commands.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{CommandContext, KindContext};
use crate::output::{print_json, print_stat, print_success};

pub fn cmd_type_info(ctx: &CommandContext, layout: &Path) -> Result<()> {
  let rt = ctx.runtime()?;
  let info = rt.block_on(async {
    let (assembler, _) = ctx.assembler();
    assembler
      .get_application_type_info(layout)
      .await
      .kind_context(format!("Reading {} failed", layout.display()))
  })?;

  if ctx.format.is_json() {
    return print_json(&info);
  }
  print_success(&format!("{} {}", info.type_name, info.type_version));
  for parameter in &info.parameters {
    print_stat(&format!("Parameter {}", parameter.name), &parameter.default_value);
  }
  for reference in &info.service_manifests {
    print_stat(&format!("Service manifest {}", reference.name), &reference.version);
  }
  Ok(())
}

pub fn cmd_get_manifests(
  ctx: &CommandContext,
  type_name: &str,
  type_version: &str,
  output: PathBuf,
  overwrite: bool,
) -> Result<()> {
  let rt = ctx.runtime()?;
  let written = rt.block_on(async {
    let (assembler, _) = ctx.assembler();
    assembler
      .get_manifests(type_name, type_version, &output, overwrite, ctx.deadline())
      .await
      .kind_context(format!("Downloading manifests of {} {} failed", type_name, type_version))
  })?;

  if ctx.format.is_json() {
    return print_json(&serde_json::json!({
      "application_type": type_name,
      "version": type_version,
      "written": written,
    }));
  }
  print_success(&format!("Downloaded manifests of {} {}", type_name, type_version));
  print_stat("Written", &written.len().to_string());
  Ok(())
}
