//! The data-store traits consumed by the reconciliation driver.
//!
//! Both traits are implemented by storage backends (e.g.
//! `catalog-store-sqlite`). The driver is generic over them and receives the
//! handles explicitly; there is no process-wide connection state.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  delta::Operation,
  record::{IncomingRecord, RecordKey, StagedKey, StagedRecord},
};

// ─── Incoming source ─────────────────────────────────────────────────────────

/// Read-only access to the external feed of candidate records.
pub trait IncomingSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Number of records in the feed.
  fn count(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Up to `limit` records with insertion id greater than `after`, ordered
  /// by insertion id.
  fn window_after(
    &self,
    after: i64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<IncomingRecord>, Self::Error>> + Send + '_;

  /// The subset of `(source_id, product_ids)` keys present in the feed,
  /// regardless of whether those records are valid.
  fn present_keys(
    &self,
    source_id: i64,
    product_ids: Vec<String>,
  ) -> impl Future<Output = Result<Vec<RecordKey>, Self::Error>> + Send + '_;
}

// ─── Staged store ────────────────────────────────────────────────────────────

/// Access to the authoritative staged record set.
pub trait StagedStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Number of staged records, reachable or not.
  fn count(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All staged records with the given `source_id` whose
  /// `source_product_id` is one of `product_ids`.
  fn find_by_keys(
    &self,
    source_id: i64,
    product_ids: Vec<String>,
  ) -> impl Future<Output = Result<Vec<StagedRecord>, Self::Error>> + Send + '_;

  /// Up to `limit` key projections with id greater than `after`, ordered by
  /// id.
  fn keys_after(
    &self,
    after: i64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<StagedKey>, Self::Error>> + Send + '_;

  /// Apply `operations` in one transaction, stamping them with `now`. On
  /// error nothing from the window is persisted.
  fn commit_window(
    &self,
    operations: Vec<Operation>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Render an operation as the literal statement `commit_window` executes
  /// for the same `now`.
  fn render(&self, operation: &Operation, now: DateTime<Utc>) -> String;
}
