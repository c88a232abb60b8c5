//! Orphan detector: staged records whose key no longer appears in the
//! incoming feed.

use std::collections::HashSet;

use catalog_core::{record::StagedKey, store::IncomingSource};

use crate::matcher::group_by_source;

/// The reachable keys in `window` that are absent from `incoming`. Presence
/// counts whether or not the incoming record is valid.
pub async fn find_orphans<I: IncomingSource>(
  incoming: &I,
  window: &[StagedKey],
) -> Result<Vec<StagedKey>, I::Error> {
  let live: Vec<&StagedKey> = window.iter().filter(|k| k.reachable).collect();

  let mut present = HashSet::new();
  for (source_id, product_ids) in group_by_source(live.iter().map(|k| &k.key)) {
    present.extend(incoming.present_keys(source_id, product_ids).await?);
  }

  Ok(
    live
      .into_iter()
      .filter(|k| !present.contains(&k.key))
      .cloned()
      .collect(),
  )
}
