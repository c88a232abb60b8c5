//! Statement builder: [`Operation`] → SQL against `products_staged`.
//!
//! Column lists come from the fixed [`Field`] mapping, never from whatever
//! keys a record happens to carry. The same assembly produces the
//! parameterized statement that is executed and the literal statement that
//! is written to the audit log, so the two cannot drift apart.

use chrono::{DateTime, Utc};
use catalog_core::delta::{Change, Field, FieldDelta, Operation};
use catalog_core::record::NewStagedRecord;
use rusqlite::types::Value;

use crate::encode::encode_dt;

pub const STAGED_TABLE: &str = "products_staged";

/// A parameterized statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
  pub sql:    String,
  pub params: Vec<Value>,
}

/// Build the parameterized statement for `operation`. `now` stamps
/// `updated_at` (and `created_at` when the record carries none).
pub fn build(operation: &Operation, now: DateTime<Utc>) -> Statement {
  let mut params = Vec::new();
  let sql = assemble(operation, now, |value| {
    params.push(value);
    format!("?{}", params.len())
  });
  Statement { sql, params }
}

/// Render `operation` with its values inlined as SQL literals.
pub fn render(operation: &Operation, now: DateTime<Utc>) -> String {
  format!("{};", assemble(operation, now, |value| literal(&value)))
}

fn assemble(
  operation: &Operation,
  now: DateTime<Utc>,
  mut bind: impl FnMut(Value) -> String,
) -> String {
  match operation {
    Operation::Create(record) => {
      let (columns, values): (Vec<&str>, Vec<Value>) =
        create_columns(record, now).into_iter().unzip();
      let placeholders: Vec<String> = values.into_iter().map(&mut bind).collect();
      format!(
        "INSERT INTO {STAGED_TABLE} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
      )
    }
    Operation::Update { id, delta } => update(*id, delta, now, bind),
    Operation::SoftDelete { id } => update(*id, &FieldDelta::unreachable(), now, bind),
  }
}

fn update(
  id: i64,
  delta: &FieldDelta,
  now: DateTime<Utc>,
  mut bind: impl FnMut(Value) -> String,
) -> String {
  let mut assignments: Vec<String> = delta
    .iter()
    .map(|(field, change)| format!("{} = {}", field.column(), bind(change_value(change))))
    .collect();
  assignments.push(format!("updated_at = {}", bind(Value::Text(encode_dt(now)))));
  let id = bind(Value::Integer(id));
  format!("UPDATE {STAGED_TABLE} SET {} WHERE id = {id}", assignments.join(", "))
}

fn create_columns(record: &NewStagedRecord, now: DateTime<Utc>) -> Vec<(&'static str, Value)> {
  let mut columns = vec![
    ("source_id", Value::Integer(record.key.source_id)),
    ("source_product_id", Value::Text(record.key.source_product_id.clone())),
  ];
  for field in Field::TEXT {
    columns.push((field.column(), optional_text(record.fields.text(field))));
  }
  columns.push((
    Field::AverageRating.column(),
    record.fields.average_rating.map_or(Value::Null, Value::Real),
  ));
  columns.push((
    Field::ReviewCount.column(),
    record.fields.review_count.map_or(Value::Null, Value::Integer),
  ));
  columns.push((Field::Reachable.column(), Value::Integer(1)));
  columns.push(("created_at", Value::Text(encode_dt(record.created_at.unwrap_or(now)))));
  columns.push(("updated_at", Value::Text(encode_dt(now))));
  columns
}

fn optional_text(value: Option<&str>) -> Value {
  value.map_or(Value::Null, |v| Value::Text(v.to_owned()))
}

fn change_value(change: &Change) -> Value {
  match change {
    Change::Text(v) => Value::Text(v.clone()),
    Change::Real(v) => Value::Real(*v),
    Change::Integer(v) => Value::Integer(*v),
    Change::Flag(v) => Value::Integer(i64::from(*v)),
  }
}

fn literal(value: &Value) -> String {
  match value {
    Value::Null => "NULL".to_owned(),
    Value::Integer(v) => v.to_string(),
    Value::Real(v) => format!("{v:?}"),
    Value::Text(v) => format!("'{}'", v.replace('\'', "''")),
    Value::Blob(bytes) => {
      let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
      format!("X'{hex}'")
    }
  }
}
