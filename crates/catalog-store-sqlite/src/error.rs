//! Error type for `catalog-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A statement inside a window failed; the window was rolled back.
  #[error("operation {position} ({operation}) failed: {source}")]
  Operation {
    position:  usize,
    operation: String,
    #[source]
    source:    rusqlite::Error,
  },

  /// An update targeted a staged record that does not exist.
  #[error("operation {position} ({operation}) matched no staged record")]
  NoSuchRecord { position: usize, operation: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
