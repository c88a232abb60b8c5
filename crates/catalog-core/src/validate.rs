//! Record validation: presence and format rules applied to one incoming
//! record before it may reach the staged store.

use serde::Serialize;
use thiserror::Error;

use crate::{
  inventory::ImageInventory,
  record::{IncomingRecord, Raw, RecordKey},
  url::{image_refs, is_blank_image, is_url},
};

/// One failed rule. A record collects every rule it breaks.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "rule", content = "detail", rename_all = "snake_case")]
pub enum Violation {
  #[error("missing required field `{0}`")]
  Missing(&'static str),

  #[error("productUrl is not a well-formed url: {0:?}")]
  MalformedProductUrl(String),

  #[error("image {0:?} is not in the image inventory")]
  UnverifiedImage(String),
}

/// A record that passed every rule, together with its natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
  pub key:    RecordKey,
  pub record: IncomingRecord,
}

/// A record that failed at least one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invalid {
  pub record:  IncomingRecord,
  pub reasons: Vec<Violation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
  Valid(Validated),
  Invalid(Invalid),
}

/// Applies the validation rules. Image verification runs only when an
/// inventory is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator<'a> {
  inventory: Option<&'a ImageInventory>,
}

impl<'a> Validator<'a> {
  pub fn new(inventory: Option<&'a ImageInventory>) -> Self { Self { inventory } }

  pub fn validate(&self, record: IncomingRecord) -> Verdict {
    let mut reasons = Vec::new();

    if !matches!(record.source_id, Raw::Value(_)) {
      reasons.push(Violation::Missing("source_id"));
    }
    for (column, raw) in [
      ("source_product_id", &record.source_product_id),
      ("brand", &record.brand),
      ("categories", &record.categories),
      ("product_url", &record.product_url),
      ("name", &record.name),
    ] {
      if raw.value().is_none_or(|v| v.trim().is_empty()) {
        reasons.push(Violation::Missing(column));
      }
    }

    if let Some(url) = record.product_url.value().filter(|v| !v.trim().is_empty())
      && !is_url(url)
    {
      reasons.push(Violation::MalformedProductUrl(url.clone()));
    }

    if let Some(inventory) = self.inventory {
      reasons.extend(unverified_images(&record, inventory));
    }

    match (reasons.is_empty(), record.key()) {
      (true, Some(key)) => Verdict::Valid(Validated { key, record }),
      _ => Verdict::Invalid(Invalid { record, reasons }),
    }
  }

  /// Validate a batch, keeping valid and invalid records in input order.
  pub fn partition(
    &self,
    records: impl IntoIterator<Item = IncomingRecord>,
  ) -> (Vec<Validated>, Vec<Invalid>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for record in records {
      match self.validate(record) {
        Verdict::Valid(v) => valid.push(v),
        Verdict::Invalid(i) => invalid.push(i),
      }
    }
    (valid, invalid)
  }
}

fn unverified_images(
  record: &IncomingRecord,
  inventory: &ImageInventory,
) -> Vec<Violation> {
  let primary = record
    .image_url
    .value()
    .map(String::as_str)
    .filter(|v| !is_blank_image(v))
    .map(str::trim)
    .into_iter();
  let alternates = record
    .alternate_images
    .value()
    .map(String::as_str)
    .filter(|v| !is_blank_image(v))
    .into_iter()
    .flat_map(image_refs);

  primary
    .chain(alternates)
    .filter(|key| !is_url(key) && !inventory.contains(key))
    .map(|key| Violation::UnverifiedImage(key.to_owned()))
    .collect()
}
