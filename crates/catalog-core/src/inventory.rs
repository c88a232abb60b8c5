//! Snapshot of object keys already present in the image bucket.

use std::collections::HashSet;

/// The set of existing object-storage keys, fetched once per run.
#[derive(Debug, Clone, Default)]
pub struct ImageInventory {
  keys: HashSet<String>,
}

impl ImageInventory {
  pub fn from_keys<I, S>(keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self { keys: keys.into_iter().map(Into::into).collect() }
  }

  /// Parse a listing with one key per line. Blank lines are ignored.
  pub fn from_listing(listing: &str) -> Self {
    Self::from_keys(
      listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty()),
    )
  }

  pub fn contains(&self, key: &str) -> bool { self.keys.contains(key) }

  pub fn len(&self) -> usize { self.keys.len() }

  pub fn is_empty(&self) -> bool { self.keys.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn listing_skips_blank_lines_and_trims() {
    let inventory = ImageInventory::from_listing("a.jpg\n\n  b.jpg \r\n\t\n");
    assert_eq!(inventory.len(), 2);
    assert!(inventory.contains("a.jpg"));
    assert!(inventory.contains("b.jpg"));
    assert!(!inventory.contains(""));
  }
}
