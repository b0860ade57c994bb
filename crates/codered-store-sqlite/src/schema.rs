//! SQL schema for the Code Red SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Events are never deleted. activation_time is written once by INSERT and
-- never appears in an UPDATE.
CREATE TABLE IF NOT EXISTS events (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    lab_type              TEXT NOT NULL,   -- 'main_lab' | 'satellite_lab'
    location              TEXT NOT NULL,
    patient_mrn           TEXT NOT NULL,
    activation_time       TEXT NOT NULL,   -- RFC 3339 UTC, fixed width; store-assigned
    assigned_runner_id    TEXT,
    assigned_clinician_id TEXT,
    resolved_at           TEXT,            -- NULL while active
    resolved_by           TEXT
);

-- Packs are append-only; only state and updated_at ever change.
CREATE TABLE IF NOT EXISTS packs (
    pack_id       TEXT PRIMARY KEY,
    event_id      INTEGER NOT NULL REFERENCES events(id),
    sequence      INTEGER NOT NULL,
    product       TEXT NOT NULL,
    unit_number   TEXT,
    state         TEXT NOT NULL DEFAULT 'dispatched',
    dispatched_at TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE (event_id, sequence)
);

-- Audit log of slot bindings. No UPDATE or DELETE is ever issued against it.
CREATE TABLE IF NOT EXISTS assignments (
    assignment_id     TEXT PRIMARY KEY,
    event_id          INTEGER NOT NULL REFERENCES events(id),
    slot              TEXT NOT NULL CHECK (slot IN ('runner', 'clinician')),
    staff_id          TEXT NOT NULL,
    previous_staff_id TEXT,
    reason            TEXT,
    recorded_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS events_active_idx      ON events(resolved_at, activation_time);
CREATE INDEX IF NOT EXISTS packs_event_idx        ON packs(event_id, sequence);
CREATE INDEX IF NOT EXISTS assignments_event_idx  ON assignments(event_id);

PRAGMA user_version = 1;
";
