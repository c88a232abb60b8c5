//! Error types for `catalog-core`.

use thiserror::Error;

use crate::delta::{ChangeKind, Field};

#[derive(Debug, Error)]
pub enum Error {
  #[error("field `{field}` holds {expected} values, got {actual}")]
  FieldKind {
    field:    Field,
    expected: ChangeKind,
    actual:   ChangeKind,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
