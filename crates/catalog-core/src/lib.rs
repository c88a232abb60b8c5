//! Records, deltas and the pure reconciliation rules for the product
//! catalog: validation, category sanitizing and field diffing.
//!
//! Storage is reached only through the traits in [`store`]; backends live in
//! their own crates.

pub mod delta;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod record;
pub mod sanitize;
pub mod store;
pub mod url;
pub mod validate;

pub use error::{Error, Result};
