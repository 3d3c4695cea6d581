//! SQL schema for the Tryst SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Rows are never deleted; terminal windows are kept for history.
CREATE TABLE IF NOT EXISTS match_windows (
    token                  TEXT PRIMARY KEY,
    user_a                 TEXT NOT NULL,
    user_b                 TEXT NOT NULL,
    user_low               TEXT NOT NULL,   -- min(user_a, user_b)
    user_high              TEXT NOT NULL,   -- max(user_a, user_b)
    compatibility_score    REAL NOT NULL,
    status                 TEXT NOT NULL,
    confirmed_a_at         TEXT,
    confirmed_b_at         TEXT,
    expires_at             TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    extension_used         INTEGER NOT NULL DEFAULT 0,
    extension_requested_by TEXT,
    conversation_id        TEXT,
    intro_a                TEXT,            -- JSON IntroMessage or NULL
    intro_b                TEXT,
    created_at             TEXT NOT NULL,
    updated_at             TEXT NOT NULL,
    version                INTEGER NOT NULL DEFAULT 0,
    CHECK (user_low < user_high)
);

-- At most one active window per unordered pair.
CREATE UNIQUE INDEX IF NOT EXISTS match_windows_active_pair_idx
    ON match_windows(user_low, user_high)
    WHERE status NOT IN ('declined_by_a', 'declined_by_b', 'expired');

CREATE INDEX IF NOT EXISTS match_windows_user_a_idx  ON match_windows(user_a);
CREATE INDEX IF NOT EXISTS match_windows_user_b_idx  ON match_windows(user_b);
CREATE INDEX IF NOT EXISTS match_windows_expiry_idx  ON match_windows(status, expires_at);

-- Strictly append-only. No UPDATE or DELETE is ever issued against it.
CREATE TABLE IF NOT EXISTS behavior_events (
    event_id          TEXT PRIMARY KEY,
    user_id           TEXT NOT NULL,
    target_user_id    TEXT,
    behavior_type     TEXT NOT NULL,
    occurred_at       TEXT NOT NULL,
    reputation_impact REAL NOT NULL,
    metadata          TEXT             -- JSON or NULL
);

CREATE INDEX IF NOT EXISTS behavior_user_type_idx ON behavior_events(user_id, behavior_type);
CREATE INDEX IF NOT EXISTS behavior_user_time_idx ON behavior_events(user_id, occurred_at);

CREATE TABLE IF NOT EXISTS reputation_scores (
    user_id                 TEXT PRIMARY KEY,
    response_quality        REAL NOT NULL CHECK (response_quality BETWEEN 0 AND 100),
    respect                 REAL NOT NULL CHECK (respect          BETWEEN 0 AND 100),
    authenticity            REAL NOT NULL CHECK (authenticity     BETWEEN 0 AND 100),
    investment              REAL NOT NULL CHECK (investment       BETWEEN 0 AND 100),
    ghosting_count          INTEGER NOT NULL DEFAULT 0,
    dates_completed         INTEGER NOT NULL DEFAULT 0,
    reports_received        INTEGER NOT NULL DEFAULT 0,
    reports_upheld          INTEGER NOT NULL DEFAULT 0,
    positive_feedback_count INTEGER NOT NULL DEFAULT 0,
    trust_level             TEXT NOT NULL,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL,
    version                 INTEGER NOT NULL DEFAULT 0
);

-- Local conversation registry: one thread per unordered pair.
CREATE TABLE IF NOT EXISTS conversations (
    conversation_id TEXT PRIMARY KEY,
    user_low        TEXT NOT NULL,
    user_high       TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    UNIQUE (user_low, user_high)
);

-- Compatibility feed; scores are symmetric.
CREATE TABLE IF NOT EXISTS compatibility_scores (
    user_low   TEXT NOT NULL,
    user_high  TEXT NOT NULL,
    score      REAL NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_low, user_high)
);

PRAGMA user_version = 1;
";
