//! Removal of one application instance version.
//!
//! An upgrade lets unchanged packages keep their rollout version, so a package
//! document can be shared by consecutive instance versions. Only the direct
//! neighbours can share it: a package reused by instance `n - 2` and `n` was
//! necessarily reused by `n - 1` as well.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{Instrument, debug, info};

use super::{AssembleError, InstanceAssembler, join_all};
use crate::deadline::Deadline;
use crate::manifest::ApplicationInstance;
use crate::store::{StoreLayout, get_json, try_get_json};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
  /// Keys removed, the instance document first.
  pub deleted: Vec<String>,
  /// Package keys kept because a neighbouring instance version still refers to them.
  pub retained: Vec<String>,
}

/// Store keys of the packages an instance refers to.
fn package_keys(instance: &ApplicationInstance) -> BTreeSet<String> {
  let type_name = &instance.application_type_name;
  let application_id = &instance.application_id;
  std::iter::once(StoreLayout::application_package(
    type_name,
    application_id,
    instance.application_package_ref,
  ))
  .chain(
    instance
      .service_package_refs
      .iter()
      .map(|r| StoreLayout::service_package(type_name, application_id, &r.name, r.rollout_version)),
  )
  .collect()
}

pub(super) async fn delete_instance(
  assembler: &InstanceAssembler,
  type_name: &str,
  application_id: &str,
  instance_version: u64,
  deadline: Deadline,
) -> Result<DeleteSummary, AssembleError> {
  if instance_version == 0 {
    return Err(AssembleError::InvalidArgument {
      argument: "instance version",
      reason: "must be at least 1".to_string(),
    });
  }
  let store = assembler.store();
  let key = StoreLayout::application_instance(type_name, application_id, instance_version);
  let neighbour = |version: u64| StoreLayout::application_instance(type_name, application_id, version);

  let previous_key = neighbour(instance_version - 1);
  let next_key = neighbour(instance_version.saturating_add(1));
  let (instance, previous, next) = tokio::try_join!(
    get_json::<ApplicationInstance>(store.as_ref(), &key, deadline),
    async {
      if instance_version > 1 {
        try_get_json::<ApplicationInstance>(store.as_ref(), &previous_key, deadline).await
      } else {
        Ok(None)
      }
    },
    try_get_json::<ApplicationInstance>(store.as_ref(), &next_key, deadline),
  )?;

  let shared: BTreeSet<String> = previous.iter().chain(next.iter()).flat_map(package_keys).collect();
  let (retained, removable): (Vec<_>, Vec<_>) = package_keys(&instance).into_iter().partition(|k| shared.contains(k));
  debug!(
    instance = %key,
    removable = removable.len(),
    retained = retained.len(),
    "planned instance removal"
  );

  // The instance goes first so no stored instance ever refers to a missing package.
  store.delete(&key, deadline).await?;
  let mut join_set = JoinSet::new();
  for package_key in removable {
    let store = Arc::clone(store);
    join_set.spawn(
      async move {
        let removed = store.delete(&package_key, deadline).await?;
        Ok::<_, AssembleError>(removed.then_some(package_key))
      }
      .in_current_span(),
    );
  }
  let mut packages: Vec<String> = join_all(join_set, |_| {}).await?.into_iter().flatten().collect();
  packages.sort();

  let mut deleted = vec![key];
  deleted.extend(packages);
  info!(
    application_id,
    instance_version,
    deleted = deleted.len(),
    retained = retained.len(),
    "application instance deleted"
  );
  Ok(DeleteSummary { deleted, retained })
}
