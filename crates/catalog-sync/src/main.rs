//! catalog-sync binary.
//!
//! Reads `catalog.toml` (or the path given with `--config`), layered with
//! `CATALOG_*` environment variables.
//!
//! ```text
//! catalog-sync reconcile [--skip-image-verification] [--no-print]
//! catalog-sync promote [--keys FILE] [--workers N]
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use catalog_core::inventory::ImageInventory;
use catalog_store_sqlite::{SqliteIncoming, SqliteStaged};
use catalog_sync::{
  Settings,
  driver::Reconciler,
  promote::{DEFAULT_WORKERS, DirectoryCopier, promote},
  report::write_lines,
};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Product catalog reconciliation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "catalog.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Sync the incoming feed into the staged store and retire orphans.
  Reconcile {
    /// Do not check image references against the image inventory.
    #[arg(long)]
    skip_image_verification: bool,

    /// Do not write the audit, image-key and invalid-record files.
    #[arg(long)]
    no_print: bool,
  },

  /// Copy pending product images into production storage.
  Promote {
    /// File with one image key per line. Defaults to `image_keys_path`.
    #[arg(short, long)]
    keys: Option<PathBuf>,

    /// Maximum number of concurrent copies.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)
    .with_context(|| format!("failed to load settings from {:?}", cli.config))?;

  match cli.command {
    Command::Reconcile { skip_image_verification, no_print } => {
      reconcile(&settings, !skip_image_verification, !no_print).await
    }
    Command::Promote { keys, workers } => {
      let keys = keys.unwrap_or_else(|| settings.image_keys_path.clone());
      promote_images(&settings, &keys, workers).await
    }
  }
}

async fn reconcile(
  settings: &Settings,
  verify_images: bool,
  write_files: bool,
) -> anyhow::Result<()> {
  let inventory = if verify_images {
    let path = settings.image_inventory_path.as_ref().context(
      "image verification needs `image_inventory_path`; \
       pass --skip-image-verification to run without it",
    )?;
    let listing = tokio::fs::read_to_string(path)
      .await
      .with_context(|| format!("failed to read image inventory {path:?}"))?;
    let inventory = ImageInventory::from_listing(&listing);
    tracing::info!(keys = inventory.len(), "loaded image inventory");
    Some(inventory)
  } else {
    None
  };

  let incoming_path = settings
    .incoming_path
    .as_ref()
    .context("reconcile needs `incoming_path`")?;
  let staged_path = settings
    .staged_path
    .as_ref()
    .context("reconcile needs `staged_path`")?;

  let incoming = SqliteIncoming::open(incoming_path)
    .await
    .with_context(|| format!("failed to open incoming store at {incoming_path:?}"))?;
  let staged = SqliteStaged::open(staged_path)
    .await
    .with_context(|| format!("failed to open staged store at {staged_path:?}"))?;

  let mut reconciler = Reconciler::new(&incoming, &staged)
    .with_window_size(settings.window_size)
    .with_audit(write_files);
  if let Some(inventory) = &inventory {
    reconciler = reconciler.with_inventory(inventory);
  }

  let report = reconciler.run().await.context("reconciliation aborted")?;

  println!("{}", report.summary);
  if !report.invalid.is_empty() {
    println!("\ninvalid products:\n{}", report.invalid_listing());
  }

  if write_files {
    report
      .write_audit(&settings.audit_path)
      .await
      .with_context(|| format!("failed to write {:?}", settings.audit_path))?;
    report
      .write_image_keys(&settings.image_keys_path)
      .await
      .with_context(|| format!("failed to write {:?}", settings.image_keys_path))?;
    report
      .write_invalid(&settings.invalid_path)
      .await
      .with_context(|| format!("failed to write {:?}", settings.invalid_path))?;
  }
  Ok(())
}

async fn promote_images(
  settings: &Settings,
  keys_path: &Path,
  workers: usize,
) -> anyhow::Result<()> {
  let source = settings
    .image_source_dir
    .clone()
    .context("promotion needs `image_source_dir`")?;
  let destination = settings
    .image_destination_dir
    .clone()
    .context("promotion needs `image_destination_dir`")?;

  let listing = tokio::fs::read_to_string(keys_path)
    .await
    .with_context(|| format!("failed to read image keys {keys_path:?}"))?;
  let keys: Vec<String> = listing.lines().map(str::to_owned).collect();

  let copier = Arc::new(DirectoryCopier::new(source, destination, settings.image_prefix.clone()));
  let report = promote(copier, &keys, workers).await;

  println!(
    "copied {} images, {} failed, {} left over",
    report.copied,
    report.failures.len(),
    report.leftover.len()
  );
  write_lines(&settings.not_completed_path, &report.leftover)
    .await
    .with_context(|| format!("failed to write {:?}", settings.not_completed_path))?;
  Ok(())
}
