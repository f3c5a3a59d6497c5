//! Implementation of the `ib create` command.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;

use imagebuilder_lib::assemble::{CreateApplicationRequest, PersistOptions};

use super::{CommandContext, KindContext};
use crate::output::{print_instance_summary, print_json};

pub struct CreateArgs {
  pub type_name: String,
  pub type_version: String,
  pub application_id: String,
  pub application_name: String,
  pub parameters: Vec<(String, String)>,
  pub output: Option<PathBuf>,
  pub upload: bool,
  pub overwrite: bool,
}

pub fn cmd_create(ctx: &CommandContext, args: CreateArgs) -> Result<()> {
  let what = format!("Creating {} from {} {} failed", args.application_name, args.type_name, args.type_version);
  let request = CreateApplicationRequest {
    type_name: args.type_name,
    type_version: args.type_version,
    application_id: args.application_id,
    application_name: args.application_name,
    parameters: args.parameters,
    flags: Default::default(),
    persist: PersistOptions {
      upload: args.upload,
      output_dir: args.output,
      overwrite: args.overwrite,
    },
  };

  let start = Instant::now();
  let rt = ctx.runtime()?;
  let created = rt.block_on(async {
    let (assembler, progress) = ctx.assembler();
    let created = assembler.create_application(request, ctx.deadline()).await.kind_context(what);
    if let Some(progress) = progress {
      progress.flush().await;
    }
    created
  })?;

  if ctx.format.is_json() {
    return print_json(&created.context.instance);
  }
  print_instance_summary("Created", &created.context, &created.persisted, start.elapsed());
  Ok(())
}
