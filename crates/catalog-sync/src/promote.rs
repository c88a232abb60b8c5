//! Image promotion: copy pending image objects into production storage with
//! a bounded pool of concurrent copies.
//!
//! Every key yields exactly one [`CopyOutcome`]. Keys that did not report
//! [`CopyOutcome::Copied`] (failed copies or tasks that panicked) form the
//! leftover list, which is written out for a later run.

use std::{
  collections::HashSet,
  future::Future,
  io,
  path::{Component, Path, PathBuf},
  sync::Arc,
};

use tokio::{sync::Semaphore, task::JoinSet};

pub const DEFAULT_WORKERS: usize = 16;

/// Copies one object from the staging location into production.
pub trait ObjectCopier: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn copy(&self, key: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
  Copied(String),
  Failed { key: String, cause: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionReport {
  pub copied:   usize,
  /// `(key, cause)` for every failed copy.
  pub failures: Vec<(String, String)>,
  /// Keys without a successful copy, in input order.
  pub leftover: Vec<String>,
}

/// Copy every key in `keys` with at most `workers` copies in flight.
pub async fn promote<C: ObjectCopier>(
  copier: Arc<C>,
  keys: &[String],
  workers: usize,
) -> PromotionReport {
  let semaphore = Arc::new(Semaphore::new(workers.max(1)));
  let mut tasks = JoinSet::new();
  let mut queued = HashSet::new();

  for key in keys.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
    if !queued.insert(key) {
      continue;
    }
    let Ok(permit) = semaphore.clone().acquire_owned().await else {
      break;
    };
    let copier = copier.clone();
    let key = key.to_owned();
    tasks.spawn(async move {
      let _permit = permit;
      match copier.copy(&key).await {
        Ok(()) => CopyOutcome::Copied(key),
        Err(e) => CopyOutcome::Failed { key, cause: e.to_string() },
      }
    });
  }

  let mut copied = HashSet::new();
  let mut failures = Vec::new();
  while let Some(joined) = tasks.join_next().await {
    match joined {
      Ok(CopyOutcome::Copied(key)) => {
        copied.insert(key);
      }
      Ok(CopyOutcome::Failed { key, cause }) => {
        tracing::warn!(%key, %cause, "image copy failed");
        failures.push((key, cause));
      }
      Err(e) => tracing::error!(error = %e, "image copy task did not finish"),
    }
  }

  let leftover = leftover(keys, &copied);
  tracing::info!(
    copied = copied.len(),
    failed = failures.len(),
    leftover = leftover.len(),
    "image promotion finished"
  );
  PromotionReport { copied: copied.len(), failures, leftover }
}

/// Input keys with no successful copy, deduplicated, in input order.
pub fn leftover(keys: &[String], copied: &HashSet<String>) -> Vec<String> {
  let mut seen = HashSet::new();
  keys
    .iter()
    .map(|k| k.trim())
    .filter(|k| !k.is_empty() && !copied.contains(*k) && seen.insert(*k))
    .map(str::to_owned)
    .collect()
}

// ─── Directory copier ─────────────────────────────────────────────────────────

/// Copies `source_root/<key>` to `destination_root/<prefix>/<key>`.
#[derive(Debug, Clone)]
pub struct DirectoryCopier {
  source_root:      PathBuf,
  destination_root: PathBuf,
  prefix:           String,
}

impl DirectoryCopier {
  pub fn new(
    source_root: impl Into<PathBuf>,
    destination_root: impl Into<PathBuf>,
    prefix: impl Into<String>,
  ) -> Self {
    Self {
      source_root:      source_root.into(),
      destination_root: destination_root.into(),
      prefix:           prefix.into(),
    }
  }

  pub fn destination(&self, key: &str) -> PathBuf {
    self.destination_root.join(&self.prefix).join(key)
  }
}

/// Keys are relative object paths; anything that could escape the roots is
/// rejected.
fn check_key(key: &str) -> io::Result<()> {
  let escapes = Path::new(key)
    .components()
    .any(|c| !matches!(c, Component::Normal(_)));
  if key.is_empty() || escapes {
    return Err(io::Error::new(
      io::ErrorKind::InvalidInput,
      format!("not a relative object key: {key:?}"),
    ));
  }
  Ok(())
}

impl ObjectCopier for DirectoryCopier {
  type Error = io::Error;

  async fn copy(&self, key: &str) -> io::Result<()> {
    check_key(key)?;
    let destination = self.destination(key);
    if let Some(parent) = destination.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(self.source_root.join(key), &destination).await?;
    Ok(())
  }
}
