//! Category sanitization.
//!
//! Retail feeds pad their category blobs with promotional copy ("Sale!",
//! "20% off", "$10 to $20", "New Arrivals"). The sanitizer strips that
//! vocabulary and punctuation noise, then reduces what is left to a
//! comma-separated list of distinct tokens in first-seen order.

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

static SEPARATORS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[,;|/]").expect("separator pattern compiles"));

/// Prices, price ranges, multi-buy offers and percentages. These start with
/// `$` or a digit, so they are matched without a leading word boundary.
static AMOUNTS: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(concat!(
    r"(?i)",
    r"\d+\s*for\s*\$\d+(?:\.\d+)?",
    r"|\$\d+(?:\.\d+)?(?:\s*(?:to|-)\s*(?:\$\d+(?:\.\d+)?)?)?",
    r"|\d+(?:\.\d+)?%(?:\s*-\s*\d+(?:\.\d+)?%)?",
  ))
  .expect("amount pattern compiles")
});

static PROMOTIONAL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(concat!(
    r"(?i)\b(?:",
    r"last\s+chance(?:\s+savings)?",
    r"|save\s+on\s+select",
    r"|new\s+arrivals",
    r"|fan\s+shop",
    r"|shop(?:\s+by\s+sport)?",
    r"|this\s+week(?:'?s)?",
    r"|online\s+only",
    r"|in\s+store",
    r"|pick\s*up",
    r"|up\s+to",
    r"|sales?",
    r"|off",
    r"|trend(?:s|ing)?",
    r"|clearance|clearence",
    r"|outlet",
    r"|only",
    r"|deals?",
    r"|with",
    r"|cash",
    r"|dick'?s?",
    r"|eastbay",
    r")\b",
  ))
  .expect("promotional pattern compiles")
});

static NOISE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"[!&$+\-*?"()]"#).expect("noise pattern compiles"));

/// Sanitize a category blob. Idempotent: sanitizing the output again
/// returns it unchanged.
pub fn sanitize_categories(raw: &str) -> String {
  let mut current = pass(raw);
  loop {
    let next = pass(&current);
    if next == current {
      return current;
    }
    current = next;
  }
}

fn pass(input: &str) -> String {
  let text = SEPARATORS.replace_all(input, " ");
  let text = AMOUNTS.replace_all(&text, " ");
  let text = PROMOTIONAL.replace_all(&text, " ");
  let text = NOISE.replace_all(&text, "");

  let mut seen = HashSet::new();
  text
    .split_whitespace()
    .filter(|token| seen.insert(*token))
    .collect::<Vec<_>>()
    .join(",")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_sale_and_percent_off() {
    assert_eq!(sanitize_categories("Sale! Shoes 20% off"), "Shoes");
  }

  #[test]
  fn strips_price_ranges_and_multibuy() {
    assert_eq!(
      sanitize_categories("Socks 3 for $10, Under $25 to $50 Hats $5.99"),
      "Socks,Under,Hats"
    );
  }

  #[test]
  fn strips_phrases_case_insensitively() {
    assert_eq!(
      sanitize_categories("NEW ARRIVALS Running LAST CHANCE SAVINGS Fan Shop"),
      "Running"
    );
    assert_eq!(
      sanitize_categories("Shop By Sport Basketball Clearance Outlet"),
      "Basketball"
    );
  }

  #[test]
  fn keeps_words_that_merely_contain_vocabulary() {
    assert_eq!(
      sanitize_categories("Without Offense Wholesale"),
      "Without,Offense,Wholesale"
    );
  }

  #[test]
  fn dedupes_in_first_seen_order() {
    assert_eq!(
      sanitize_categories("Men Shoes, Men Running Shoes"),
      "Men,Shoes,Running"
    );
  }

  #[test]
  fn removes_punctuation_noise() {
    assert_eq!(sanitize_categories("Tees & Tanks + T-Shirts"), "Tees,Tanks,TShirts");
  }

  #[test]
  fn sanitizing_twice_is_stable() {
    for raw in [
      "Sale! Shoes 20% off",
      "Men Shoes, Men Running Shoes",
      "foo new foo arrivals",
      "",
      "   ",
      "Dick's Sporting Goods 10%-50% Deals!",
      "a,b,,c",
    ] {
      let once = sanitize_categories(raw);
      assert_eq!(sanitize_categories(&once), once, "input {raw:?}");
    }
  }

  #[test]
  fn empty_when_only_promotional() {
    assert_eq!(sanitize_categories("Sale Clearance 50% Off!"), "");
  }
}
