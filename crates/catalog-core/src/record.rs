//! Record types: the incoming feed's candidate products and the staged
//! store's authoritative ones.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::delta::Field;

// ─── Raw ─────────────────────────────────────────────────────────────────────

/// A column read from the dynamically typed incoming store.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Raw<T> {
  Value(T),
  #[default]
  Null,
  /// The stored value is not of the column's declared type.
  Mismatch,
}

impl<T> Raw<T> {
  pub fn value(&self) -> Option<&T> {
    match self {
      Self::Value(v) => Some(v),
      _ => None,
    }
  }

  pub fn into_option(self) -> Option<T> {
    match self {
      Self::Value(v) => Some(v),
      _ => None,
    }
  }

  pub fn is_mismatch(&self) -> bool { matches!(self, Self::Mismatch) }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Raw<U> {
    match self {
      Self::Value(v) => Raw::Value(f(v)),
      Self::Null => Raw::Null,
      Self::Mismatch => Raw::Mismatch,
    }
  }
}

impl<T> From<T> for Raw<T> {
  fn from(value: T) -> Self { Self::Value(value) }
}

impl From<&str> for Raw<String> {
  fn from(value: &str) -> Self { Self::Value(value.to_owned()) }
}

// ─── Keys ────────────────────────────────────────────────────────────────────

/// The composite natural key shared by incoming and staged records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordKey {
  pub source_id:         i64,
  pub source_product_id: String,
}

impl RecordKey {
  pub fn new(source_id: i64, source_product_id: impl Into<String>) -> Self {
    Self { source_id, source_product_id: source_product_id.into() }
  }
}

impl fmt::Display for RecordKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}, {:?})", self.source_id, self.source_product_id)
  }
}

/// The projection of a staged record used when sweeping for orphans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedKey {
  pub id:        i64,
  pub key:       RecordKey,
  pub reachable: bool,
}

// ─── IncomingRecord ──────────────────────────────────────────────────────────

/// A candidate product observation from the external feed. Read-only to the
/// reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRecord {
  /// Insertion id; monotonic within the feed.
  pub id:                i64,
  pub source_id:         Raw<i64>,
  pub source_product_id: Raw<String>,
  pub name:              Raw<String>,
  pub brand:             Raw<String>,
  pub description:       Raw<String>,
  pub product_url:       Raw<String>,
  pub sku:               Raw<String>,
  pub image_url:         Raw<String>,
  /// Comma-separated image references.
  pub alternate_images:  Raw<String>,
  /// Free-text tag blob.
  pub categories:        Raw<String>,
  pub colors:            Raw<String>,
  pub sizes:             Raw<String>,
  pub model:             Raw<String>,
  pub average_rating:    Raw<f64>,
  pub review_count:      Raw<i64>,
  pub created_at:        Option<DateTime<Utc>>,
  pub updated_at:        Option<DateTime<Utc>>,
}

impl IncomingRecord {
  /// A record with the given insertion id and every column null.
  pub fn blank(id: i64) -> Self { Self { id, ..Self::default() } }

  /// The text column for `field`, or `None` for non-text fields.
  pub fn text(&self, field: Field) -> Option<&Raw<String>> {
    Some(match field {
      Field::Name => &self.name,
      Field::Brand => &self.brand,
      Field::Description => &self.description,
      Field::ProductUrl => &self.product_url,
      Field::Sku => &self.sku,
      Field::ImageUrl => &self.image_url,
      Field::AlternateImages => &self.alternate_images,
      Field::Categories => &self.categories,
      Field::Colors => &self.colors,
      Field::Sizes => &self.sizes,
      Field::Model => &self.model,
      Field::AverageRating | Field::ReviewCount | Field::Reachable => {
        return None;
      }
    })
  }

  /// The natural key, if both halves are present and well typed.
  pub fn key(&self) -> Option<RecordKey> {
    let source_id = *self.source_id.value()?;
    let source_product_id = self.source_product_id.value()?;
    Some(RecordKey::new(source_id, source_product_id.clone()))
  }

  /// Descriptive fields whose stored value has the wrong type.
  pub fn mismatched_fields(&self) -> Vec<Field> {
    let mut fields: Vec<Field> = Field::TEXT
      .into_iter()
      .filter(|f| self.text(*f).is_some_and(Raw::is_mismatch))
      .collect();
    if self.average_rating.is_mismatch() {
      fields.push(Field::AverageRating);
    }
    if self.review_count.is_mismatch() {
      fields.push(Field::ReviewCount);
    }
    fields
  }
}

// ─── ProductFields ───────────────────────────────────────────────────────────

/// The descriptive columns of a staged record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductFields {
  pub name:             Option<String>,
  pub brand:            Option<String>,
  pub description:      Option<String>,
  pub product_url:      Option<String>,
  pub sku:              Option<String>,
  pub image_url:        Option<String>,
  pub alternate_images: Option<String>,
  pub categories:       Option<String>,
  pub colors:           Option<String>,
  pub sizes:            Option<String>,
  pub model:            Option<String>,
  pub average_rating:   Option<f64>,
  pub review_count:     Option<i64>,
}

impl ProductFields {
  /// The stored text for `field`; `None` for nulls and non-text fields.
  pub fn text(&self, field: Field) -> Option<&str> {
    match field {
      Field::Name => self.name.as_deref(),
      Field::Brand => self.brand.as_deref(),
      Field::Description => self.description.as_deref(),
      Field::ProductUrl => self.product_url.as_deref(),
      Field::Sku => self.sku.as_deref(),
      Field::ImageUrl => self.image_url.as_deref(),
      Field::AlternateImages => self.alternate_images.as_deref(),
      Field::Categories => self.categories.as_deref(),
      Field::Colors => self.colors.as_deref(),
      Field::Sizes => self.sizes.as_deref(),
      Field::Model => self.model.as_deref(),
      Field::AverageRating | Field::ReviewCount | Field::Reachable => None,
    }
  }
}

// ─── Staged records ──────────────────────────────────────────────────────────

/// The authoritative, deduplicated record held in the staged store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedRecord {
  pub id:         i64,
  pub key:        RecordKey,
  pub fields:     ProductFields,
  /// Liveness flag; false means logically deleted but physically retained.
  pub reachable:  bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to a create operation. The surrogate id and `updated_at` are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewStagedRecord {
  pub key:        RecordKey,
  pub fields:     ProductFields,
  /// Carried over from the feed when present; otherwise set by the store.
  pub created_at: Option<DateTime<Utc>>,
}
