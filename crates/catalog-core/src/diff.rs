//! Difference engine: incoming record + matched staged record → minimal
//! [`FieldDelta`].
//!
//! Incoming values are normalized before comparison, and the same
//! normalization shapes the record written by a create. That symmetry is
//! what makes a second run over an unchanged feed produce no writes.

use crate::{
  Result,
  delta::{Change, Field, FieldDelta},
  record::{IncomingRecord, NewStagedRecord, ProductFields, Raw, StagedRecord},
  sanitize::sanitize_categories,
  url::NO_IMAGE,
  validate::Validated,
};

/// The feed's placeholder for a product without a known brand.
pub const UNKNOWN_BRAND: &str = "Unknown";

/// The normalized incoming value of a text field.
pub fn normalized_text(record: &IncomingRecord, field: Field) -> Raw<String> {
  let Some(raw) = record.text(field) else {
    return Raw::Null;
  };
  raw.clone().map(|value| match field {
    Field::ImageUrl | Field::AlternateImages if value == NO_IMAGE => String::new(),
    Field::Brand if value == UNKNOWN_BRAND => String::new(),
    Field::Categories => sanitize_categories(&value),
    _ => value,
  })
}

/// Compute the changes needed to bring `existing` in line with `incoming`.
///
/// A field is included only when the incoming value is present with its
/// declared type and differs from the stored one. Mistyped incoming values
/// are skipped for that field alone. An empty incoming `imageUrl` never
/// erases a stored image. An unreachable record is always resurrected.
pub fn diff(existing: &StagedRecord, incoming: &IncomingRecord) -> Result<FieldDelta> {
  let mut delta = FieldDelta::new();

  for field in Field::TEXT {
    let Raw::Value(value) = normalized_text(incoming, field) else {
      continue;
    };
    if field == Field::ImageUrl && value.is_empty() {
      continue;
    }
    if existing.fields.text(field) != Some(value.as_str()) {
      delta.insert(field, Change::Text(value))?;
    }
  }

  if let Raw::Value(rating) = incoming.average_rating
    && existing.fields.average_rating != Some(rating)
  {
    delta.insert(Field::AverageRating, Change::Real(rating))?;
  }

  if let Raw::Value(count) = incoming.review_count
    && existing.fields.review_count != Some(count)
  {
    delta.insert(Field::ReviewCount, Change::Integer(count))?;
  }

  if !existing.reachable {
    delta.insert(Field::Reachable, Change::Flag(true))?;
  }

  Ok(delta)
}

/// Build the record a create operation writes for a validated incoming
/// record. Mistyped or null columns are stored as null.
pub fn prepare_create(validated: &Validated) -> NewStagedRecord {
  let record = &validated.record;
  let text = |field| normalized_text(record, field).into_option();

  NewStagedRecord {
    key:        validated.key.clone(),
    fields:     ProductFields {
      name:             text(Field::Name),
      brand:            text(Field::Brand),
      description:      text(Field::Description),
      product_url:      text(Field::ProductUrl),
      sku:              text(Field::Sku),
      image_url:        text(Field::ImageUrl),
      alternate_images: text(Field::AlternateImages),
      categories:       text(Field::Categories),
      colors:           text(Field::Colors),
      sizes:            text(Field::Sizes),
      model:            text(Field::Model),
      average_rating:   record.average_rating.value().copied(),
      review_count:     record.review_count.value().copied(),
    },
    created_at: record.created_at,
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::record::RecordKey;

  fn incoming() -> IncomingRecord {
    IncomingRecord {
      source_id: Raw::Value(1),
      source_product_id: "A".into(),
      name: "Shoe".into(),
      brand: "Nike".into(),
      description: "A shoe".into(),
      product_url: "http://x.com/a".into(),
      image_url: "http://img.example.com/a.jpg".into(),
      alternate_images: "".into(),
      categories: "Shoes".into(),
      average_rating: Raw::Value(4.5),
      review_count: Raw::Value(10),
      ..IncomingRecord::blank(1)
    }
  }

  fn validated(record: IncomingRecord) -> Validated {
    Validated { key: record.key().unwrap(), record }
  }

  /// The staged record a create of `record` would have produced.
  fn staged_from(record: &IncomingRecord, id: i64, reachable: bool) -> StagedRecord {
    let created = prepare_create(&validated(record.clone()));
    let ts = Utc.timestamp_opt(1_000_000, 0).unwrap();
    StagedRecord {
      id,
      key: created.key,
      fields: created.fields,
      reachable,
      created_at: ts,
      updated_at: ts,
    }
  }

  #[test]
  fn identical_record_yields_empty_delta() {
    let record = incoming();
    let existing = staged_from(&record, 7, true);
    assert!(diff(&existing, &record).unwrap().is_empty());
  }

  #[test]
  fn brand_change_yields_single_field() {
    let existing = staged_from(&incoming(), 7, true);
    let changed = IncomingRecord { brand: "Adidas".into(), ..incoming() };

    let delta = diff(&existing, &changed).unwrap();
    assert_eq!(delta.len(), 1);
    assert_eq!(delta.get(Field::Brand), Some(&Change::Text("Adidas".into())));
  }

  #[test]
  fn unreachable_record_is_resurrected() {
    let record = incoming();
    let existing = staged_from(&record, 9, false);

    let delta = diff(&existing, &record).unwrap();
    assert_eq!(delta.len(), 1);
    assert_eq!(delta.get(Field::Reachable), Some(&Change::Flag(true)));
  }

  #[test]
  fn resurrection_keeps_genuine_changes() {
    let existing = staged_from(&incoming(), 9, false);
    let changed = IncomingRecord { review_count: Raw::Value(11), ..incoming() };

    let delta = diff(&existing, &changed).unwrap();
    let fields: Vec<Field> = delta.iter().map(|(f, _)| f).collect();
    assert_eq!(fields, vec![Field::ReviewCount, Field::Reachable]);
  }

  #[test]
  fn sentinels_are_normalized() {
    let mut existing = staged_from(&incoming(), 7, true);
    existing.fields.brand = Some(String::new());
    existing.fields.alternate_images = Some(String::new());

    let changed = IncomingRecord {
      brand: "Unknown".into(),
      alternate_images: "None".into(),
      ..incoming()
    };
    assert!(diff(&existing, &changed).unwrap().is_empty());
  }

  #[test]
  fn blank_image_never_erases_existing_image() {
    let existing = staged_from(&incoming(), 7, true);
    for blank in ["", "None"] {
      let changed = IncomingRecord { image_url: blank.into(), ..incoming() };
      assert!(diff(&existing, &changed).unwrap().is_empty(), "{blank:?}");
    }
  }

  #[test]
  fn categories_are_compared_after_sanitizing() {
    let existing = staged_from(&incoming(), 7, true);
    let noisy = IncomingRecord { categories: "Shoes Sale! 30% off".into(), ..incoming() };
    assert!(diff(&existing, &noisy).unwrap().is_empty());

    let different = IncomingRecord { categories: "Boots, Sale".into(), ..incoming() };
    let delta = diff(&existing, &different).unwrap();
    assert_eq!(delta.get(Field::Categories), Some(&Change::Text("Boots".into())));
  }

  #[test]
  fn mistyped_fields_are_skipped_individually() {
    let existing = staged_from(&incoming(), 7, true);
    let changed = IncomingRecord {
      average_rating: Raw::Mismatch,
      review_count: Raw::Mismatch,
      description: Raw::Mismatch,
      name: "Shoe v2".into(),
      ..incoming()
    };

    let delta = diff(&existing, &changed).unwrap();
    assert_eq!(delta.len(), 1);
    assert!(delta.contains(Field::Name));
    assert_eq!(
      changed.mismatched_fields(),
      vec![Field::Description, Field::AverageRating, Field::ReviewCount]
    );
  }

  #[test]
  fn null_incoming_values_do_not_clear_stored_ones() {
    let existing = staged_from(&incoming(), 7, true);
    let changed = IncomingRecord { description: Raw::Null, sku: Raw::Null, ..incoming() };
    assert!(diff(&existing, &changed).unwrap().is_empty());
  }

  #[test]
  fn diff_is_deterministic() {
    let existing = staged_from(&incoming(), 7, false);
    let changed = IncomingRecord {
      name: "Other".into(),
      colors: "Red".into(),
      average_rating: Raw::Value(1.0),
      ..incoming()
    };
    assert_eq!(diff(&existing, &changed).unwrap(), diff(&existing, &changed).unwrap());
  }

  #[test]
  fn create_sanitizes_and_normalizes() {
    let record = IncomingRecord {
      categories: "Sale! Shoes 20% off".into(),
      brand: "Unknown".into(),
      image_url: "None".into(),
      review_count: Raw::Mismatch,
      ..incoming()
    };
    let created = prepare_create(&validated(record));
    assert_eq!(created.key, RecordKey::new(1, "A"));
    assert_eq!(created.fields.categories.as_deref(), Some("Shoes"));
    assert_eq!(created.fields.brand.as_deref(), Some(""));
    assert_eq!(created.fields.image_url.as_deref(), Some(""));
    assert_eq!(created.fields.review_count, None);
    assert_eq!(created.fields.average_rating, Some(4.5));
  }
}
