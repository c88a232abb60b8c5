//! URL grammar for product links and image references.

use std::sync::LazyLock;

use regex::Regex;

static URL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(concat!(
    r"(?i)^(?:http|ftp)s?://",
    r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)",
    r"|localhost",
    r"|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
    r"(?::\d+)?",
    r"(?:/?|[/?]\S+)$",
  ))
  .expect("url pattern compiles")
});

/// True if `s` is a well-formed `http`, `https`, `ftp` or `ftps` URL.
pub fn is_url(s: &str) -> bool { URL.is_match(s) }

/// The literal the feed uses for "no image".
pub const NO_IMAGE: &str = "None";

/// Split a comma-separated image list into its non-blank entries.
pub fn image_refs(list: &str) -> impl Iterator<Item = &str> {
  list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// True if an image column holds no reference at all.
pub fn is_blank_image(value: &str) -> bool {
  let value = value.trim();
  value.is_empty() || value == NO_IMAGE
}

/// Object-storage keys referenced by an image column pair, skipping blanks
/// and anything that is already a URL.
pub fn image_keys(image_url: Option<&str>, alternates: Option<&str>) -> Vec<String> {
  let primary = image_url
    .filter(|v| !is_blank_image(v))
    .map(str::trim)
    .into_iter();
  let alternates = alternates
    .filter(|v| !is_blank_image(v))
    .into_iter()
    .flat_map(image_refs);

  primary
    .chain(alternates)
    .filter(|key| !is_url(key))
    .map(str::to_owned)
    .collect()
}
