//! Incremental reconciliation of an incoming product feed into the staged
//! catalog.
//!
//! The [`driver::Reconciler`] walks the feed in fixed windows, validates and
//! diffs each record against the staged store, commits one transaction per
//! window, then sweeps the staged store for records that left the feed. The
//! [`promote`] module copies the images a run referenced into production
//! storage.

pub mod driver;
pub mod error;
pub mod matcher;
pub mod orphan;
pub mod promote;
pub mod report;

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use error::{Error, Result};

// ─── Settings ─────────────────────────────────────────────────────────────────

/// Run configuration, deserialised from the TOML config file layered with
/// `CATALOG_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// Required by `reconcile`.
  #[serde(default)]
  pub incoming_path:         Option<PathBuf>,
  /// Required by `reconcile`.
  #[serde(default)]
  pub staged_path:           Option<PathBuf>,
  /// One object key per line. Required unless image verification is
  /// skipped.
  #[serde(default)]
  pub image_inventory_path:  Option<PathBuf>,
  #[serde(default = "default_window_size")]
  pub window_size:           usize,
  #[serde(default = "default_audit_path")]
  pub audit_path:            PathBuf,
  #[serde(default = "default_image_keys_path")]
  pub image_keys_path:       PathBuf,
  #[serde(default = "default_invalid_path")]
  pub invalid_path:          PathBuf,
  #[serde(default)]
  pub image_source_dir:      Option<PathBuf>,
  #[serde(default)]
  pub image_destination_dir: Option<PathBuf>,
  #[serde(default = "default_image_prefix")]
  pub image_prefix:          String,
  #[serde(default = "default_not_completed_path")]
  pub not_completed_path:    PathBuf,
}

fn default_window_size() -> usize { driver::DEFAULT_WINDOW_SIZE }
fn default_audit_path() -> PathBuf { "Product_Updates.sql.txt".into() }
fn default_image_keys_path() -> PathBuf { "Product_Image_Updates.txt".into() }
fn default_invalid_path() -> PathBuf { "Invalid_Products.json".into() }
fn default_image_prefix() -> String { "productImages".into() }
fn default_not_completed_path() -> PathBuf { "Not_Completed.txt".into() }

impl Settings {
  /// Load settings from `path` (optional) and the environment.
  pub fn load(path: &Path) -> Result<Self> {
    let settings: Settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CATALOG").try_parsing(true))
      .build()?
      .try_deserialize()?;
    settings.check()?;
    Ok(settings)
  }

  fn check(&self) -> Result<()> {
    if self.window_size == 0 {
      return Err(Error::Setting {
        name:   "window_size",
        reason: "must be at least 1".into(),
      });
    }
    Ok(())
  }
}
