//! Encoding and decoding helpers between the record types and SQLite rows.
//!
//! All timestamps are stored as RFC 3339 strings. Incoming cells are decoded
//! by storage class into [`Raw`], so a value of the wrong type surfaces as
//! [`Raw::Mismatch`] instead of a row error.

use catalog_core::record::{
  IncomingRecord, ProductFields, Raw, RecordKey, StagedKey, StagedRecord,
};
use chrono::{DateTime, Utc};
use rusqlite::{Row, types::ValueRef};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Raw cells ───────────────────────────────────────────────────────────────

pub fn raw_text(value: ValueRef<'_>) -> Raw<String> {
  match value {
    ValueRef::Null => Raw::Null,
    ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
      Ok(s) => Raw::Value(s.to_owned()),
      Err(_) => Raw::Mismatch,
    },
    ValueRef::Integer(_) | ValueRef::Real(_) | ValueRef::Blob(_) => Raw::Mismatch,
  }
}

/// Ratings are numeric; integers are accepted and widened.
pub fn raw_real(value: ValueRef<'_>) -> Raw<f64> {
  match value {
    ValueRef::Null => Raw::Null,
    ValueRef::Real(v) => Raw::Value(v),
    ValueRef::Integer(v) => Raw::Value(v as f64),
    ValueRef::Text(_) | ValueRef::Blob(_) => Raw::Mismatch,
  }
}

pub fn raw_integer(value: ValueRef<'_>) -> Raw<i64> {
  match value {
    ValueRef::Null => Raw::Null,
    ValueRef::Integer(v) => Raw::Value(v),
    ValueRef::Real(_) | ValueRef::Text(_) | ValueRef::Blob(_) => Raw::Mismatch,
  }
}

fn raw_dt(value: ValueRef<'_>) -> Option<DateTime<Utc>> {
  raw_text(value).into_option().and_then(|s| decode_dt(&s).ok())
}

pub fn raw_to_value<T: Into<rusqlite::types::Value>>(raw: Raw<T>) -> rusqlite::types::Value {
  raw.into_option().map_or(rusqlite::types::Value::Null, Into::into)
}

// ─── Incoming rows ───────────────────────────────────────────────────────────

pub const INCOMING_COLUMNS: &str = "id, source_id, source_product_id, name, brand, \
  description, product_url, sku, image_url, alternate_images, categories, colors, \
  sizes, model, average_rating, review_count, created_at, updated_at";

pub fn incoming_from_row(row: &Row<'_>) -> rusqlite::Result<IncomingRecord> {
  Ok(IncomingRecord {
    id:                row.get(0)?,
    source_id:         raw_integer(row.get_ref(1)?),
    source_product_id: raw_text(row.get_ref(2)?),
    name:              raw_text(row.get_ref(3)?),
    brand:             raw_text(row.get_ref(4)?),
    description:       raw_text(row.get_ref(5)?),
    product_url:       raw_text(row.get_ref(6)?),
    sku:               raw_text(row.get_ref(7)?),
    image_url:         raw_text(row.get_ref(8)?),
    alternate_images:  raw_text(row.get_ref(9)?),
    categories:        raw_text(row.get_ref(10)?),
    colors:            raw_text(row.get_ref(11)?),
    sizes:             raw_text(row.get_ref(12)?),
    model:             raw_text(row.get_ref(13)?),
    average_rating:    raw_real(row.get_ref(14)?),
    review_count:      raw_integer(row.get_ref(15)?),
    created_at:        raw_dt(row.get_ref(16)?),
    updated_at:        raw_dt(row.get_ref(17)?),
  })
}

// ─── Staged rows ─────────────────────────────────────────────────────────────

pub const STAGED_COLUMNS: &str = "id, source_id, source_product_id, name, brand, \
  description, product_url, sku, image_url, alternate_images, categories, colors, \
  sizes, model, average_rating, review_count, reachable, created_at, updated_at";

/// Values read directly from a `products_staged` row.
pub struct RawStagedRecord {
  pub id:                i64,
  pub source_id:         i64,
  pub source_product_id: String,
  pub fields:            ProductFields,
  pub reachable:         i64,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawStagedRecord {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      source_id:         row.get(1)?,
      source_product_id: row.get(2)?,
      fields:            ProductFields {
        name:             row.get(3)?,
        brand:            row.get(4)?,
        description:      row.get(5)?,
        product_url:      row.get(6)?,
        sku:              row.get(7)?,
        image_url:        row.get(8)?,
        alternate_images: row.get(9)?,
        categories:       row.get(10)?,
        colors:           row.get(11)?,
        sizes:            row.get(12)?,
        model:            row.get(13)?,
        average_rating:   row.get(14)?,
        review_count:     row.get(15)?,
      },
      reachable:         row.get(16)?,
      created_at:        row.get(17)?,
      updated_at:        row.get(18)?,
    })
  }

  pub fn into_record(self) -> Result<StagedRecord> {
    Ok(StagedRecord {
      id:         self.id,
      key:        RecordKey::new(self.source_id, self.source_product_id),
      fields:     self.fields,
      reachable:  self.reachable != 0,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub fn staged_key_from_row(row: &Row<'_>) -> rusqlite::Result<StagedKey> {
  let reachable: i64 = row.get(3)?;
  Ok(StagedKey {
    id:        row.get(0)?,
    key:       RecordKey::new(row.get::<_, i64>(1)?, row.get::<_, String>(2)?),
    reachable: reachable != 0,
  })
}

/// `?2, ?3, …` placeholders for an `IN` list that follows one leading
/// parameter.
pub fn in_list(len: usize) -> String {
  (2..len + 2).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}
