//! Error type for `catalog-sync`.

use thiserror::Error;

use crate::driver::Phase;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] catalog_core::Error),

  #[error("incoming source error: {0}")]
  Incoming(#[source] BoxError),

  #[error("staged store error: {0}")]
  Staged(#[source] BoxError),

  /// A window failed to commit and was rolled back; the run stops here.
  #[error(
    "{phase} window {window} (ids {first_id}..={last_id}, {operations} operations) \
     rolled back: {source}"
  )]
  Commit {
    phase:      Phase,
    window:     usize,
    first_id:   i64,
    last_id:    i64,
    operations: usize,
    #[source]
    source:     BoxError,
  },

  #[error("invalid setting `{name}`: {reason}")]
  Setting { name: &'static str, reason: String },

  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  pub fn incoming(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Incoming(Box::new(e))
  }

  pub fn staged(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Staged(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
