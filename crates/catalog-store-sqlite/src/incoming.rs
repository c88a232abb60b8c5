//! The SQLite implementation of [`IncomingSource`].

use std::path::Path;

use catalog_core::{
  record::{IncomingRecord, RecordKey},
  store::IncomingSource,
};
use rusqlite::types::Value;

use crate::{
  Error, Result,
  encode::{INCOMING_COLUMNS, encode_dt, in_list, incoming_from_row, raw_to_value},
  schema::INCOMING_SCHEMA,
};

/// The incoming product feed backed by a single SQLite file.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteIncoming {
  conn: tokio_rusqlite::Connection,
}

impl SqliteIncoming {
  /// Open (or create) a feed at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an empty in-memory feed.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(INCOMING_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Append a record to the feed and return its insertion id. The record's
  /// own `id` is ignored; mismatched cells are written as NULL.
  pub async fn insert(&self, record: &IncomingRecord) -> Result<i64> {
    let values: Vec<Value> = vec![
      raw_to_value(record.source_id.clone()),
      raw_to_value(record.source_product_id.clone()),
      raw_to_value(record.name.clone()),
      raw_to_value(record.brand.clone()),
      raw_to_value(record.description.clone()),
      raw_to_value(record.product_url.clone()),
      raw_to_value(record.sku.clone()),
      raw_to_value(record.image_url.clone()),
      raw_to_value(record.alternate_images.clone()),
      raw_to_value(record.categories.clone()),
      raw_to_value(record.colors.clone()),
      raw_to_value(record.sizes.clone()),
      raw_to_value(record.model.clone()),
      raw_to_value(record.average_rating.clone()),
      raw_to_value(record.review_count.clone()),
      record.created_at.map_or(Value::Null, |dt| Value::Text(encode_dt(dt))),
      record.updated_at.map_or(Value::Null, |dt| Value::Text(encode_dt(dt))),
    ];

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO products_incoming (
             source_id, source_product_id, name, brand, description,
             product_url, sku, image_url, alternate_images, categories,
             colors, sizes, model, average_rating, review_count,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17)",
          rusqlite::params_from_iter(values.iter()),
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(id)
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }
}

// ─── IncomingSource impl ─────────────────────────────────────────────────────

impl IncomingSource for SqliteIncoming {
  type Error = Error;

  async fn count(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM products_incoming", [], |r| r.get(0))?)
      })
      .await?;
    Ok(count.max(0) as u64)
  }

  async fn window_after(&self, after: i64, limit: usize) -> Result<Vec<IncomingRecord>> {
    let limit = limit as i64;
    let records = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INCOMING_COLUMNS} FROM products_incoming
           WHERE id > ?1
           ORDER BY id
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![after, limit], incoming_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(records)
  }

  async fn present_keys(
    &self,
    source_id: i64,
    product_ids: Vec<String>,
  ) -> Result<Vec<RecordKey>> {
    if product_ids.is_empty() {
      return Ok(Vec::new());
    }

    let keys = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT DISTINCT source_product_id FROM products_incoming
           WHERE source_id = ?1 AND source_product_id IN ({})",
          in_list(product_ids.len())
        );
        let params = std::iter::once(Value::Integer(source_id))
          .chain(product_ids.into_iter().map(Value::Text));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(RecordKey::new(source_id, row.get::<_, String>(0)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(keys)
  }
}
