//! SQL schema for the incoming and staged product tables.
//!
//! Executed once at connection startup. Both scripts are idempotent thanks
//! to `CREATE TABLE IF NOT EXISTS`.

/// The incoming feed. Descriptive columns carry no declared type, so values
/// keep the storage class the feed wrote them with and mistyped values stay
/// detectable.
pub const INCOMING_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS products_incoming (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id,
    source_product_id,
    name,
    brand,
    description,
    product_url,
    sku,
    image_url,
    alternate_images,        -- comma-separated image references
    categories,              -- free-text tag blob
    colors,
    sizes,
    model,
    average_rating,
    review_count,
    created_at,              -- ISO 8601 UTC or NULL
    updated_at
);

CREATE INDEX IF NOT EXISTS incoming_key_idx
    ON products_incoming(source_id, source_product_id);

PRAGMA user_version = 1;
";

/// The staged store. Rows are never deleted; `reachable = 0` marks a
/// product that left the feed.
pub const STAGED_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS products_staged (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id         INTEGER NOT NULL,
    source_product_id TEXT    NOT NULL,
    name              TEXT,
    brand             TEXT,
    description       TEXT,
    product_url       TEXT,
    sku               TEXT,
    image_url         TEXT,
    alternate_images  TEXT,
    categories        TEXT,
    colors            TEXT,
    sizes             TEXT,
    model             TEXT,
    average_rating    REAL,
    review_count      INTEGER,
    reachable         INTEGER NOT NULL DEFAULT 1,
    created_at        TEXT    NOT NULL,   -- ISO 8601 UTC
    updated_at        TEXT    NOT NULL,   -- ISO 8601 UTC; server-assigned
    UNIQUE (source_id, source_product_id)
);

PRAGMA user_version = 1;
";
