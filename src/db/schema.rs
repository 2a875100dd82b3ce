//! Database schema and migrations for feedrelay.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records which ones already ran.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: sources, subscriptions, contents
    r#"
-- One row per unique feed origin
CREATE TABLE sources (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    link        TEXT NOT NULL UNIQUE,
    title       TEXT NOT NULL,
    error_count INTEGER NOT NULL DEFAULT 0,   -- consecutive fetch failures
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per (subscriber, source) pair
CREATE TABLE subscriptions (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    subscriber_id       INTEGER NOT NULL,
    source_id           INTEGER NOT NULL,
    interval_minutes    INTEGER NOT NULL,
    enable_notification INTEGER NOT NULL DEFAULT 1,
    enable_telegraph    INTEGER NOT NULL DEFAULT 1,
    tag                 TEXT NOT NULL DEFAULT '',
    wait_time           INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at          TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(subscriber_id, source_id)
);

CREATE INDEX idx_subscriptions_source_id ON subscriptions(source_id);

-- Deduplicated feed entries
CREATE TABLE contents (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id       INTEGER NOT NULL,
    raw_id          TEXT NOT NULL,
    hash_id         TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL DEFAULT '',
    raw_link        TEXT NOT NULL DEFAULT '',
    telegraph_url   TEXT,
    created_at      TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(source_id, hash_id)
);

CREATE INDEX idx_contents_hash_id ON contents(hash_id);
"#,
];
