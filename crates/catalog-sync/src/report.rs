//! The outcome of one reconciliation run and the files written from it.

use std::{collections::BTreeSet, fmt, path::Path};

use catalog_core::validate::Invalid;
use serde::Serialize;
use uuid::Uuid;

use crate::Result;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
  pub created:         usize,
  pub updated:         usize,
  pub unchanged:       usize,
  pub invalid:         usize,
  pub soft_deleted:    usize,
  pub duplicates:      usize,
  pub type_mismatches: usize,
  pub image_keys:      usize,
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "products created:        {}", self.created)?;
    writeln!(f, "products updated:        {}", self.updated)?;
    writeln!(f, "products unchanged:      {}", self.unchanged)?;
    writeln!(f, "products invalid:        {}", self.invalid)?;
    writeln!(f, "products soft-deleted:   {}", self.soft_deleted)?;
    writeln!(f, "duplicate keys skipped:  {}", self.duplicates)?;
    writeln!(f, "mistyped fields skipped: {}", self.type_mismatches)?;
    write!(f, "image keys pending:      {}", self.image_keys)
  }
}

#[derive(Debug, Clone)]
pub struct RunReport {
  pub run_id:     Uuid,
  pub summary:    Summary,
  /// Records that failed validation, in feed order.
  pub invalid:    Vec<Invalid>,
  /// Object keys referenced by written records that still need promoting.
  pub image_keys: BTreeSet<String>,
  /// Literal statements for every committed operation. Only collected when
  /// auditing is enabled.
  pub statements: Vec<String>,
}

impl RunReport {
  pub fn new(run_id: Uuid) -> Self {
    Self {
      run_id,
      summary: Summary::default(),
      invalid: Vec::new(),
      image_keys: BTreeSet::new(),
      statements: Vec::new(),
    }
  }

  /// One line per invalid record: insertion id, name and reasons.
  pub fn invalid_listing(&self) -> String {
    self
      .invalid
      .iter()
      .map(|entry| {
        let name = entry.record.name.value().map_or("<no name>", String::as_str);
        let reasons: Vec<String> = entry.reasons.iter().map(ToString::to_string).collect();
        format!("id: {} name: {name} ({})", entry.record.id, reasons.join("; "))
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  /// Write the audit log: a header naming the run, then one statement per
  /// line in commit order.
  pub async fn write_audit(&self, path: &Path) -> Result<()> {
    let mut contents = format!("-- catalog-sync run {}\n", self.run_id);
    for statement in &self.statements {
      contents.push_str(statement);
      contents.push('\n');
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
  }

  pub async fn write_image_keys(&self, path: &Path) -> Result<()> {
    write_lines(path, self.image_keys.iter()).await
  }

  pub async fn write_invalid(&self, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&self.invalid)?;
    tokio::fs::write(path, json).await?;
    Ok(())
  }
}

/// Write one entry per line.
pub async fn write_lines<T: AsRef<str>>(
  path: &Path,
  lines: impl IntoIterator<Item = T>,
) -> Result<()> {
  let mut contents = String::new();
  for line in lines {
    contents.push_str(line.as_ref());
    contents.push('\n');
  }
  tokio::fs::write(path, contents).await?;
  Ok(())
}
