//! SQL schema for the shopkeep SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS stores (
    store_code  TEXT PRIMARY KEY,
    platform    TEXT NOT NULL,   -- 'baemin' | 'yogiyo' | 'coupang_eats' | 'naver'
    native_code TEXT NOT NULL,   -- the platform's own store identifier
    username    TEXT NOT NULL,
    password    TEXT NOT NULL,
    policy      TEXT NOT NULL    -- JSON-encoded StorePolicy
);

-- Review facts are written once at ingestion; only the processing columns
-- (status, reply_text, quality_score, generation_attempts, error_reason,
-- updated_at) ever change, and always through a guarded UPDATE on status.
CREATE TABLE IF NOT EXISTS reviews (
    review_id           TEXT PRIMARY KEY,   -- sha-256 of platform:store:native id
    store_code          TEXT NOT NULL REFERENCES stores(store_code),
    platform            TEXT NOT NULL,
    reviewer_name       TEXT NOT NULL,
    rating              INTEGER,            -- 1..=5 or NULL
    content             TEXT NOT NULL DEFAULT '',
    ordered_items       TEXT NOT NULL DEFAULT '[]',  -- JSON array of strings
    review_date         TEXT NOT NULL,      -- ISO 8601 date
    delivery_feedback   TEXT,

    status              TEXT NOT NULL DEFAULT 'pending',
    reply_text          TEXT,
    quality_score       REAL,
    generation_attempts INTEGER NOT NULL DEFAULT 0,
    requeue_count       INTEGER NOT NULL DEFAULT 0,
    error_reason        TEXT,

    ingested_at         TEXT NOT NULL,      -- ISO 8601 UTC; server-assigned
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS reviews_store_idx  ON reviews(store_code);
CREATE INDEX IF NOT EXISTS reviews_status_idx ON reviews(status);
CREATE INDEX IF NOT EXISTS reviews_claim_idx  ON reviews(store_code, status, ingested_at);

PRAGMA user_version = 1;
";
