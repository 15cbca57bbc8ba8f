//! SQL schema for the Cascade SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Owned by the external directory; the engine only reads it.
CREATE TABLE IF NOT EXISTS users (
    user_id         TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    role            TEXT NOT NULL,
    manager_id      TEXT
);

-- Bearer tokens are stored as SHA-256 hex digests, never in clear.
CREATE TABLE IF NOT EXISTS api_tokens (
    token_hash TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS goals (
    goal_id         TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT,
    goal_type       TEXT NOT NULL,   -- 'objective' | 'key_result'
    level           TEXT NOT NULL,   -- 'personal' | 'team' | 'company'
    target_value    REAL,
    current_value   REAL NOT NULL DEFAULT 0,
    unit            TEXT,
    confidence      INTEGER NOT NULL,
    start_date      TEXT,            -- YYYY-MM-DD
    end_date        TEXT,
    status          TEXT NOT NULL,
    owner_id        TEXT NOT NULL,
    department_id   TEXT,
    team_id         TEXT,
    parent_goal_id  TEXT REFERENCES goals(goal_id),
    is_archived     INTEGER NOT NULL DEFAULT 0,
    version         INTEGER NOT NULL,
    created_at      TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    updated_at      TEXT NOT NULL
);

-- Progress check-ins are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS goal_progress (
    progress_id    TEXT PRIMARY KEY,
    goal_id        TEXT NOT NULL REFERENCES goals(goal_id),
    previous_value REAL NOT NULL,
    new_value      REAL NOT NULL,
    confidence     INTEGER NOT NULL,
    comment        TEXT,
    evidence_url   TEXT,
    user_id        TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    kind            TEXT NOT NULL,
    title           TEXT NOT NULL,
    message         TEXT NOT NULL,
    data_json       TEXT NOT NULL DEFAULT 'null',
    is_read         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recognitions (
    recognition_id  TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    from_user_id    TEXT NOT NULL,
    to_user_id      TEXT NOT NULL,
    message         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS goals_org_idx           ON goals(organization_id, created_at);
CREATE INDEX IF NOT EXISTS goals_owner_idx         ON goals(owner_id, updated_at);
CREATE INDEX IF NOT EXISTS goals_parent_idx        ON goals(parent_goal_id);
CREATE INDEX IF NOT EXISTS progress_goal_idx       ON goal_progress(goal_id, created_at);
CREATE INDEX IF NOT EXISTS notifications_user_idx  ON notifications(user_id, created_at);
CREATE INDEX IF NOT EXISTS recognitions_user_idx   ON recognitions(to_user_id, created_at);

PRAGMA user_version = 1;
";
