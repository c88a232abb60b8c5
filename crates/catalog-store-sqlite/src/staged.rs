//! The SQLite implementation of [`StagedStore`].

use std::path::Path;

use catalog_core::{
  delta::Operation,
  record::{StagedKey, StagedRecord},
  store::StagedStore,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use crate::{
  Error, Result,
  encode::{RawStagedRecord, STAGED_COLUMNS, in_list, staged_key_from_row},
  schema::STAGED_SCHEMA,
  statement::{self, Statement},
};

/// The staged product store backed by a single SQLite file.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteStaged {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStaged {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an empty in-memory store.
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
        conn.execute_batch(STAGED_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch a staged record by surrogate id.
  pub async fn get(&self, id: i64) -> Result<Option<StagedRecord>> {
    let raw: Option<RawStagedRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STAGED_COLUMNS} FROM products_staged WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map([id], RawStagedRecord::from_row)?;
        Ok(rows.next().transpose()?)
      })
      .await?;

    raw.map(RawStagedRecord::into_record).transpose()
  }
}

// ─── StagedStore impl ────────────────────────────────────────────────────────

impl StagedStore for SqliteStaged {
  type Error = Error;

  async fn count(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM products_staged", [], |r| r.get(0))?)
      })
      .await?;
    Ok(count.max(0) as u64)
  }

  async fn find_by_keys(
    &self,
    source_id: i64,
    product_ids: Vec<String>,
  ) -> Result<Vec<StagedRecord>> {
    if product_ids.is_empty() {
      return Ok(Vec::new());
    }

    let raws: Vec<RawStagedRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {STAGED_COLUMNS} FROM products_staged
           WHERE source_id = ?1 AND source_product_id IN ({})",
          in_list(product_ids.len())
        );
        let params = std::iter::once(Value::Integer(source_id))
          .chain(product_ids.into_iter().map(Value::Text));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawStagedRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStagedRecord::into_record).collect()
  }

  async fn keys_after(&self, after: i64, limit: usize) -> Result<Vec<StagedKey>> {
    let limit = limit as i64;
    let keys = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, source_id, source_product_id, reachable
           FROM products_staged
           WHERE id > ?1
           ORDER BY id
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![after, limit], staged_key_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(keys)
  }

  async fn commit_window(&self, operations: Vec<Operation>, now: DateTime<Utc>) -> Result<()> {
    if operations.is_empty() {
      return Ok(());
    }

    let statements: Vec<(String, bool, Statement)> = operations
      .iter()
      .map(|op| {
        let is_update = !matches!(op, Operation::Create(_));
        (op.label(), is_update, statement::build(op, now))
      })
      .collect();
    let total = statements.len();

    // The transaction rolls back when dropped without a commit, so every
    // early return below leaves the window unapplied.
    let outcome: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for (position, (operation, is_update, stmt)) in statements.into_iter().enumerate() {
          match tx.execute(&stmt.sql, rusqlite::params_from_iter(stmt.params.iter())) {
            Ok(0) if is_update => {
              return Ok(Err(Error::NoSuchRecord { position, operation }));
            }
            Ok(_) => {}
            Err(source) => {
              return Ok(Err(Error::Operation { position, operation, source }));
            }
          }
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    if outcome.is_ok() {
      tracing::debug!(operations = total, "window committed");
    }
    outcome
  }

  fn render(&self, operation: &Operation, now: DateTime<Utc>) -> String {
    statement::render(operation, now)
  }
}
