//! The reconciliation driver.
//!
//! A run has two phases. *Sync* walks the incoming feed in windows ordered by
//! insertion id and writes creates and updates. *Sweep* walks the staged
//! store in windows ordered by id and soft-deletes records whose key left
//! the feed. Every window is committed as one transaction; the first window
//! that fails to commit stops the run.

use std::{collections::HashSet, fmt};

use catalog_core::{
  delta::{Change, Field, Operation},
  inventory::ImageInventory,
  store::{IncomingSource, StagedStore},
  url::image_keys,
  validate::Validator,
};
use chrono::Utc;
use tracing::Instrument as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  matcher::{self, Partition},
  orphan::find_orphans,
  report::RunReport,
};

pub const DEFAULT_WINDOW_SIZE: usize = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Sync,
  Sweep,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Phase::Sync => "sync",
      Phase::Sweep => "sweep",
    })
  }
}

/// The bounds of one window, for logging and error context.
#[derive(Debug, Clone, Copy)]
struct Window {
  phase:    Phase,
  number:   usize,
  first_id: i64,
  last_id:  i64,
}

// ─── Reconciler ───────────────────────────────────────────────────────────────

/// Drives one reconciliation run over explicit store handles.
pub struct Reconciler<'a, I, S> {
  incoming:    &'a I,
  staged:      &'a S,
  inventory:   Option<&'a ImageInventory>,
  window_size: usize,
  audit:       bool,
}

impl<'a, I, S> Reconciler<'a, I, S>
where
  I: IncomingSource,
  S: StagedStore,
{
  pub fn new(incoming: &'a I, staged: &'a S) -> Self {
    Self {
      incoming,
      staged,
      inventory: None,
      window_size: DEFAULT_WINDOW_SIZE,
      audit: false,
    }
  }

  /// Verify image references against `inventory`.
  pub fn with_inventory(mut self, inventory: &'a ImageInventory) -> Self {
    self.inventory = Some(inventory);
    self
  }

  /// Records per window. Values below one are treated as one.
  pub fn with_window_size(mut self, window_size: usize) -> Self {
    self.window_size = window_size.max(1);
    self
  }

  /// Collect the literal statement of every committed operation.
  pub fn with_audit(mut self, audit: bool) -> Self {
    self.audit = audit;
    self
  }

  /// Run both phases and return the report. Windows committed before a
  /// failure stay committed.
  pub async fn run(&self) -> Result<RunReport> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("reconcile", %run_id);

    async {
      let mut report = RunReport::new(run_id);
      self.sync(&mut report).await?;
      self.sweep(&mut report).await?;
      report.summary.image_keys = report.image_keys.len();
      tracing::info!(
        created = report.summary.created,
        updated = report.summary.updated,
        soft_deleted = report.summary.soft_deleted,
        invalid = report.summary.invalid,
        "reconciliation finished"
      );
      Ok::<_, Error>(report)
    }
    .instrument(span)
    .await
  }

  // ─── Sync ─────────────────────────────────────────────────────────────────

  async fn sync(&self, report: &mut RunReport) -> Result<()> {
    let total = self.incoming.count().await.map_err(Error::incoming)?;
    tracing::info!(total, window_size = self.window_size, "syncing incoming products");

    let validator = Validator::new(self.inventory);
    let mut handled = HashSet::new();
    let mut cursor = 0;
    let mut processed = 0u64;
    let mut number = 0;

    loop {
      let records = self
        .incoming
        .window_after(cursor, self.window_size)
        .await
        .map_err(Error::incoming)?;
      let (Some(first), Some(last)) = (records.first(), records.last()) else {
        break;
      };
      number += 1;
      let window = Window {
        phase: Phase::Sync,
        number,
        first_id: first.id,
        last_id: last.id,
      };
      let read = records.len() as u64;

      let (valid, invalid) = validator.partition(records);
      for entry in &invalid {
        tracing::debug!(id = entry.record.id, reasons = ?entry.reasons, "invalid product");
      }
      report.summary.invalid += invalid.len();
      report.invalid.extend(invalid);

      for entry in &valid {
        let fields = entry.record.mismatched_fields();
        if !fields.is_empty() {
          tracing::debug!(id = entry.record.id, ?fields, "skipping mistyped fields");
          report.summary.type_mismatches += fields.len();
        }
      }

      let existing = matcher::fetch_existing(self.staged, &valid)
        .await
        .map_err(Error::staged)?;
      let partition = matcher::partition(valid, existing, &mut handled)?;
      if !partition.duplicates.is_empty() {
        tracing::warn!(
          window = number,
          duplicates = partition.duplicates.len(),
          "repeated keys in feed; kept the first occurrence"
        );
      }
      let counts = WindowCounts::of(&partition);
      let operations = partition.into_operations();
      let keys = written_image_keys(&operations);

      self.commit(window, operations, report).await?;

      report.summary.created += counts.created;
      report.summary.updated += counts.updated;
      report.summary.unchanged += counts.unchanged;
      report.summary.duplicates += counts.duplicates;
      report.image_keys.extend(keys);

      cursor = window.last_id;
      processed += read;
      tracing::info!(
        window = number,
        processed,
        total,
        created = counts.created,
        updated = counts.updated,
        "sync window committed"
      );
    }
    Ok(())
  }

  // ─── Sweep ────────────────────────────────────────────────────────────────

  async fn sweep(&self, report: &mut RunReport) -> Result<()> {
    let total = self.staged.count().await.map_err(Error::staged)?;
    tracing::info!(total, "sweeping staged products for orphans");

    let mut cursor = 0;
    let mut processed = 0u64;
    let mut number = 0;

    loop {
      let keys = self
        .staged
        .keys_after(cursor, self.window_size)
        .await
        .map_err(Error::staged)?;
      let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        break;
      };
      number += 1;
      let window = Window {
        phase: Phase::Sweep,
        number,
        first_id: first.id,
        last_id: last.id,
      };

      let orphans = find_orphans(self.incoming, &keys)
        .await
        .map_err(Error::incoming)?;
      let deleted = orphans.len();
      let operations = orphans
        .into_iter()
        .map(|k| Operation::SoftDelete { id: k.id })
        .collect();

      self.commit(window, operations, report).await?;
      report.summary.soft_deleted += deleted;

      cursor = window.last_id;
      processed += keys.len() as u64;
      tracing::info!(window = number, processed, total, deleted, "sweep window committed");
    }
    Ok(())
  }

  // ─── Commit ───────────────────────────────────────────────────────────────

  async fn commit(
    &self,
    window: Window,
    operations: Vec<Operation>,
    report: &mut RunReport,
  ) -> Result<()> {
    if operations.is_empty() {
      return Ok(());
    }

    let now = Utc::now();
    let rendered: Vec<String> = if self.audit {
      operations.iter().map(|op| self.staged.render(op, now)).collect()
    } else {
      Vec::new()
    };
    let count = operations.len();

    if let Err(e) = self.staged.commit_window(operations, now).await {
      tracing::error!(
        phase = %window.phase,
        window = window.number,
        first_id = window.first_id,
        last_id = window.last_id,
        operations = count,
        error = %e,
        "window rolled back"
      );
      return Err(Error::Commit {
        phase:      window.phase,
        window:     window.number,
        first_id:   window.first_id,
        last_id:    window.last_id,
        operations: count,
        source:     Box::new(e),
      });
    }

    report.statements.extend(rendered);
    Ok(())
  }
}

#[derive(Debug, Clone, Copy)]
struct WindowCounts {
  created:    usize,
  updated:    usize,
  unchanged:  usize,
  duplicates: usize,
}

impl WindowCounts {
  fn of(partition: &Partition) -> Self {
    Self {
      created:    partition.created.len(),
      updated:    partition.changed.len(),
      unchanged:  partition.unchanged,
      duplicates: partition.duplicates.len(),
    }
  }
}

/// Object keys referenced by the image columns a window writes.
fn written_image_keys(operations: &[Operation]) -> Vec<String> {
  fn text(change: Option<&Change>) -> Option<&str> {
    match change {
      Some(Change::Text(v)) => Some(v.as_str()),
      _ => None,
    }
  }

  operations
    .iter()
    .flat_map(|op| match op {
      Operation::Create(record) => image_keys(
        record.fields.image_url.as_deref(),
        record.fields.alternate_images.as_deref(),
      ),
      Operation::Update { delta, .. } => image_keys(
        text(delta.get(Field::ImageUrl)),
        text(delta.get(Field::AlternateImages)),
      ),
      Operation::SoftDelete { .. } => Vec::new(),
    })
    .collect()
}
