//! Field deltas and the pending write operations built from them.
//!
//! Every column the reconciler may write is named by [`Field`]; there is no
//! path from a dynamic key to a column name. A [`FieldDelta`] is ordered by
//! field, so two deltas built from the same inputs are identical regardless
//! of the order in which fields were compared.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::{EnumIter, IntoStaticStr};

use crate::{Error, Result, record::NewStagedRecord};

// ─── Field ───────────────────────────────────────────────────────────────────

/// A writable column of the staged store.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  EnumIter,
  IntoStaticStr,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
  Name,
  Brand,
  Description,
  ProductUrl,
  Sku,
  ImageUrl,
  AlternateImages,
  Categories,
  Colors,
  Sizes,
  Model,
  AverageRating,
  ReviewCount,
  Reachable,
}

impl Field {
  /// Descriptive text fields, in comparison order.
  pub const TEXT: [Field; 11] = [
    Field::Name,
    Field::Brand,
    Field::Description,
    Field::ProductUrl,
    Field::Sku,
    Field::ImageUrl,
    Field::AlternateImages,
    Field::Categories,
    Field::Colors,
    Field::Sizes,
    Field::Model,
  ];

  /// The column this field is stored in.
  pub fn column(self) -> &'static str { self.into() }

  /// The only kind of value this field accepts.
  pub fn kind(self) -> ChangeKind {
    match self {
      Self::AverageRating => ChangeKind::Real,
      Self::ReviewCount => ChangeKind::Integer,
      Self::Reachable => ChangeKind::Flag,
      _ => ChangeKind::Text,
    }
  }
}

// ─── Change ──────────────────────────────────────────────────────────────────

/// A new value for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Change {
  Text(String),
  Real(f64),
  Integer(i64),
  Flag(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
  Text,
  Real,
  Integer,
  Flag,
}

impl Change {
  pub fn kind(&self) -> ChangeKind {
    match self {
      Self::Text(_) => ChangeKind::Text,
      Self::Real(_) => ChangeKind::Real,
      Self::Integer(_) => ChangeKind::Integer,
      Self::Flag(_) => ChangeKind::Flag,
    }
  }
}

// ─── FieldDelta ──────────────────────────────────────────────────────────────

/// The set of field changes that brings a staged record in line with its
/// incoming counterpart. Empty means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldDelta(BTreeMap<Field, Change>);

impl FieldDelta {
  pub fn new() -> Self { Self::default() }

  /// Record a change, rejecting values whose kind the field cannot hold.
  pub fn insert(&mut self, field: Field, change: Change) -> Result<()> {
    let expected = field.kind();
    let actual = change.kind();
    if expected != actual {
      return Err(Error::FieldKind { field, expected, actual });
    }
    self.0.insert(field, change);
    Ok(())
  }

  pub fn get(&self, field: Field) -> Option<&Change> { self.0.get(&field) }

  pub fn contains(&self, field: Field) -> bool { self.0.contains_key(&field) }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  /// Changes in column order.
  pub fn iter(&self) -> impl Iterator<Item = (Field, &Change)> {
    self.0.iter().map(|(f, c)| (*f, c))
  }

  /// The delta that marks a record logically deleted.
  pub fn unreachable() -> Self {
    Self(BTreeMap::from([(Field::Reachable, Change::Flag(false))]))
  }
}

// ─── Operation ───────────────────────────────────────────────────────────────

/// One pending write against the staged store. A window's operations are
/// committed together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
  Create(NewStagedRecord),
  Update { id: i64, delta: FieldDelta },
  /// Flips `reachable` to false; staged records are never removed.
  SoftDelete { id: i64 },
}

impl Operation {
  /// Short label used in logs and error context.
  pub fn label(&self) -> String {
    match self {
      Self::Create(record) => format!("create {}", record.key),
      Self::Update { id, .. } => format!("update #{id}"),
      Self::SoftDelete { id } => format!("soft-delete #{id}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn columns_are_snake_case() {
    assert_eq!(Field::ProductUrl.column(), "product_url");
    assert_eq!(Field::AlternateImages.column(), "alternate_images");
    assert_eq!(Field::Reachable.to_string(), "reachable");
  }

  #[test]
  fn text_list_covers_every_text_field() {
    let text: Vec<Field> =
      Field::iter().filter(|f| f.kind() == ChangeKind::Text).collect();
    assert_eq!(text, Field::TEXT.to_vec());
  }

  #[test]
  fn insert_rejects_wrong_kind() {
    let mut delta = FieldDelta::new();
    let err = delta
      .insert(Field::ReviewCount, Change::Text("12".into()))
      .unwrap_err();
    assert!(matches!(
      err,
      Error::FieldKind { field: Field::ReviewCount, .. }
    ));
    assert!(delta.is_empty());
  }

  #[test]
  fn iteration_order_is_column_order() {
    let mut delta = FieldDelta::new();
    delta.insert(Field::Reachable, Change::Flag(true)).unwrap();
    delta.insert(Field::Brand, Change::Text("Nike".into())).unwrap();
    delta.insert(Field::Name, Change::Text("Shoe".into())).unwrap();

    let fields: Vec<Field> = delta.iter().map(|(f, _)| f).collect();
    assert_eq!(fields, vec![Field::Name, Field::Brand, Field::Reachable]);
  }
}
