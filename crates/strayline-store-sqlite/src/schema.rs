//! SQL schema for the Strayline SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS cases (
    case_id          TEXT PRIMARY KEY,
    animal_name      TEXT,
    description      TEXT NOT NULL,
    condition        TEXT NOT NULL,   -- 'HEALTHY' .. 'CRITICAL'
    location         TEXT NOT NULL,
    lon              REAL,            -- both present or both NULL
    lat              REAL,
    photo_url        TEXT,
    status           TEXT NOT NULL,   -- 'PENDING' .. 'CLOSED'
    reporter_id      TEXT NOT NULL,
    reporter_name    TEXT NOT NULL,
    reporter_contact TEXT NOT NULL,
    assignee_id      TEXT,
    assignee_name    TEXT,
    priority         INTEGER NOT NULL DEFAULT 3,
    -- Optimistic-concurrency counter; bumped by every transition. The
    -- conditional UPDATE on (status, version) is what serialises
    -- concurrent transitions.
    version          INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    updated_at       TEXT NOT NULL
);

-- Notes are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS case_notes (
    note_id     TEXT PRIMARY KEY,
    case_id     TEXT NOT NULL REFERENCES cases(case_id),
    content     TEXT NOT NULL,
    author_id   TEXT NOT NULL,
    author_name TEXT NOT NULL,
    added_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS responders (
    responder_id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    contact      TEXT,
    area         TEXT NOT NULL,
    lon          REAL,
    lat          REAL,
    role         TEXT NOT NULL,   -- 'FEEDER' | 'RESCUER' | 'VET' | 'TRANSPORT' | 'FOSTER'
    availability TEXT NOT NULL,   -- 'PENDING' | 'ACTIVE' | 'INACTIVE' | 'REJECTED'
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id     TEXT PRIMARY KEY,
    recipient_id        TEXT NOT NULL,
    kind                TEXT NOT NULL,
    title               TEXT NOT NULL,
    message             TEXT NOT NULL,
    related_entity_id   TEXT,
    related_entity_type TEXT,
    is_read             INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,
    read_at             TEXT
);

CREATE INDEX IF NOT EXISTS cases_status_created_idx ON cases(status, created_at);
CREATE INDEX IF NOT EXISTS cases_assignee_idx       ON cases(assignee_id);
CREATE INDEX IF NOT EXISTS case_notes_case_idx      ON case_notes(case_id);
CREATE INDEX IF NOT EXISTS notifications_inbox_idx  ON notifications(recipient_id, is_read);

PRAGMA user_version = 1;
";
