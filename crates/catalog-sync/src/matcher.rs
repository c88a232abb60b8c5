//! Batch matcher: pairs a window of validated records with the staged
//! records that share their natural key.

use std::collections::{BTreeMap, HashMap, HashSet, hash_map::Entry};

use catalog_core::{
  delta::{FieldDelta, Operation},
  diff::{diff, prepare_create},
  record::{NewStagedRecord, RecordKey, StagedRecord},
  store::StagedStore,
  validate::Validated,
};

/// Group keys by `source_id`, keeping each product id once in first-seen
/// order.
pub fn group_by_source<'k>(
  keys: impl IntoIterator<Item = &'k RecordKey>,
) -> BTreeMap<i64, Vec<String>> {
  let mut groups: BTreeMap<i64, Vec<String>> = BTreeMap::new();
  let mut seen = HashSet::new();
  for key in keys {
    if seen.insert(key) {
      groups
        .entry(key.source_id)
        .or_default()
        .push(key.source_product_id.clone());
    }
  }
  groups
}

/// Fetch every staged record whose key appears in `batch`, one query per
/// distinct `source_id`.
pub async fn fetch_existing<S: StagedStore>(
  store: &S,
  batch: &[Validated],
) -> Result<Vec<StagedRecord>, S::Error> {
  let mut existing = Vec::new();
  for (source_id, product_ids) in group_by_source(batch.iter().map(|v| &v.key)) {
    existing.extend(store.find_by_keys(source_id, product_ids).await?);
  }
  Ok(existing)
}

/// A window split by what must happen to each record.
#[derive(Debug, Default)]
pub struct Partition {
  pub created:    Vec<NewStagedRecord>,
  pub changed:    Vec<(i64, FieldDelta)>,
  pub unchanged:  usize,
  /// Repeats of a key already handled earlier in the run.
  pub duplicates: Vec<RecordKey>,
}

impl Partition {
  /// Creates followed by updates, each in window order.
  pub fn into_operations(self) -> Vec<Operation> {
    self
      .created
      .into_iter()
      .map(Operation::Create)
      .chain(
        self
          .changed
          .into_iter()
          .map(|(id, delta)| Operation::Update { id, delta }),
      )
      .collect()
  }
}

/// Pair `batch` with `existing` by natural key and diff each match.
///
/// `handled` holds every key already processed in this run, across windows.
/// Only the first occurrence of a key is considered, so the outcome does not
/// depend on where window boundaries fall. If the store returned more than
/// one record for a key, the reachable one wins.
pub fn partition(
  batch: Vec<Validated>,
  existing: Vec<StagedRecord>,
  handled: &mut HashSet<RecordKey>,
) -> catalog_core::Result<Partition> {
  let mut by_key: HashMap<RecordKey, StagedRecord> = HashMap::new();
  for record in existing {
    match by_key.entry(record.key.clone()) {
      Entry::Occupied(mut slot) => {
        if record.reachable && !slot.get().reachable {
          slot.insert(record);
        }
      }
      Entry::Vacant(slot) => {
        slot.insert(record);
      }
    }
  }

  let mut out = Partition::default();
  for validated in batch {
    if !handled.insert(validated.key.clone()) {
      tracing::debug!(key = %validated.key, id = validated.record.id, "duplicate key in feed");
      out.duplicates.push(validated.key);
      continue;
    }

    match by_key.get(&validated.key) {
      Some(staged) => {
        let delta = diff(staged, &validated.record)?;
        if delta.is_empty() {
          out.unchanged += 1;
        } else {
          out.changed.push((staged.id, delta));
        }
      }
      None => out.created.push(prepare_create(&validated)),
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use catalog_core::{
    delta::Field,
    record::{IncomingRecord, ProductFields, Raw},
  };
  use chrono::Utc;

  use super::*;

  fn validated(id: i64, product_id: &str, brand: &str) -> Validated {
    Validated {
      key:    RecordKey::new(1, product_id),
      record: IncomingRecord {
        source_id: Raw::Value(1),
        source_product_id: product_id.into(),
        name: "Shoe".into(),
        brand: brand.into(),
        product_url: "http://x.com/a".into(),
        categories: "Shoes".into(),
        ..IncomingRecord::blank(id)
      },
    }
  }

  fn staged(id: i64, product_id: &str, brand: &str, reachable: bool) -> StagedRecord {
    StagedRecord {
      id,
      key: RecordKey::new(1, product_id),
      fields: ProductFields {
        name: Some("Shoe".into()),
        brand: Some(brand.into()),
        product_url: Some("http://x.com/a".into()),
        categories: Some("Shoes".into()),
        ..ProductFields::default()
      },
      reachable,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn groups_keys_by_source() {
    let keys = [
      RecordKey::new(2, "B"),
      RecordKey::new(1, "A"),
      RecordKey::new(2, "C"),
      RecordKey::new(2, "B"),
    ];
    let groups = group_by_source(&keys);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[&1], vec!["A".to_string()]);
    assert_eq!(groups[&2], vec!["B".to_string(), "C".to_string()]);
  }

  #[test]
  fn splits_new_changed_and_unchanged() {
    let batch = vec![
      validated(1, "A", "Nike"),
      validated(2, "B", "Adidas"),
      validated(3, "C", "Puma"),
    ];
    let existing = vec![staged(10, "A", "Nike", true), staged(11, "B", "Nike", true)];

    let out = partition(batch, existing, &mut HashSet::new()).unwrap();
    assert_eq!(out.unchanged, 1);
    assert_eq!(out.changed.len(), 1);
    assert_eq!(out.changed[0].0, 11);
    assert!(out.changed[0].1.contains(Field::Brand));
    assert_eq!(out.created.len(), 1);
    assert_eq!(out.created[0].key, RecordKey::new(1, "C"));
  }

  #[test]
  fn repeated_key_keeps_first_occurrence() {
    let batch = vec![validated(1, "A", "Nike"), validated(2, "A", "Adidas")];
    let out = partition(batch, vec![], &mut HashSet::new()).unwrap();
    assert_eq!(out.created.len(), 1);
    assert_eq!(out.created[0].fields.brand.as_deref(), Some("Nike"));
    assert_eq!(out.duplicates, vec![RecordKey::new(1, "A")]);
  }

  #[test]
  fn key_handled_in_an_earlier_window_is_a_duplicate() {
    let mut handled = HashSet::new();
    let first = partition(vec![validated(1, "A", "Nike")], vec![], &mut handled).unwrap();
    assert_eq!(first.created.len(), 1);

    // The earlier window's create is now staged; the later repeat must not
    // overwrite it.
    let existing = vec![staged(10, "A", "Nike", true)];
    let later = partition(vec![validated(2, "A", "Adidas")], existing, &mut handled).unwrap();
    assert!(later.changed.is_empty());
    assert!(later.created.is_empty());
    assert_eq!(later.duplicates, vec![RecordKey::new(1, "A")]);
  }

  #[test]
  fn reachable_match_wins_over_retired_one() {
    let existing = vec![staged(10, "A", "Nike", false), staged(11, "A", "Nike", true)];
    let out = partition(vec![validated(1, "A", "Nike")], existing, &mut HashSet::new()).unwrap();
    assert_eq!(out.unchanged, 1);
    assert!(out.changed.is_empty());
  }

  #[test]
  fn operations_list_creates_before_updates() {
    let batch = vec![validated(1, "A", "Adidas"), validated(2, "B", "Nike")];
    let existing = vec![staged(10, "A", "Nike", true)];
    let ops = partition(batch, existing, &mut HashSet::new()).unwrap().into_operations();
    assert!(matches!(ops[0], Operation::Create(_)));
    assert!(matches!(ops[1], Operation::Update { id: 10, .. }));
  }
}
