//! Implementation of the `ib cluster-upgrade` command.

use anyhow::Result;

use imagebuilder_lib::upgrade::upgrade_cluster;

use super::{CommandContext, KindContext};
use crate::output::{print_info, print_json, print_stat, print_success};

pub fn cmd_cluster_upgrade(ctx: &CommandContext, current: &str, target: &str, write_result: bool) -> Result<()> {
  let store = ctx.store();
  let rt = ctx.runtime()?;
  let result = rt
    .block_on(async {
      let catalog = &ctx.config.settings_catalog;
      upgrade_cluster(store.as_ref(), catalog, current, target, ctx.deadline(), write_result).await
    })
    .kind_context(format!("Classifying cluster upgrade {} -> {} failed", current, target))?;

  if ctx.format.is_json() {
    return print_json(&serde_json::json!({
      "current": result.current.to_string(),
      "target": result.target.to_string(),
      "is_config_only": result.is_config_only,
      "result_key": result.result_key,
    }));
  }

  if result.is_config_only {
    print_success(&format!("{} -> {} is a configuration-only upgrade", result.current, result.target));
  } else {
    print_info(&format!("{} -> {} requires a full upgrade", result.current, result.target));
  }
  if let Some(key) = &result.result_key {
    print_stat("Result", key);
  }
  Ok(())
}
