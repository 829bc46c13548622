//! SQL schema for the clinic SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Rows are never deleted; cancellation is a status.
-- `status` only changes through a conditional UPDATE keyed on its old value.
CREATE TABLE IF NOT EXISTS appointments (
    appointment_id TEXT PRIMARY KEY,
    client_id      TEXT NOT NULL,
    pet_id         TEXT NOT NULL,
    service_id     TEXT NOT NULL,
    vet_id         TEXT,
    scheduled_at   TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    status         TEXT NOT NULL,   -- 'pending' | 'accepted' | 'rejected' | 'completed' | 'cancelled'
    notes          TEXT NOT NULL DEFAULT '',
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- Append-only audit of committed status writes.
CREATE TABLE IF NOT EXISTS appointment_transitions (
    transition_id  TEXT PRIMARY KEY,
    appointment_id TEXT NOT NULL REFERENCES appointments(appointment_id),
    from_status    TEXT,            -- NULL for the creating write
    to_status      TEXT NOT NULL,
    actor_id       TEXT NOT NULL,
    actor_role     TEXT NOT NULL,
    recorded_at    TEXT NOT NULL
);

-- Durable per-audience notification queue.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    audience        TEXT NOT NULL,  -- 'user:<uuid>' | 'admin'
    kind            TEXT NOT NULL,
    appointment_id  TEXT,
    message         TEXT NOT NULL,
    read            INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS appointments_client_idx   ON appointments(client_id);
CREATE INDEX IF NOT EXISTS appointments_vet_idx      ON appointments(vet_id);
CREATE INDEX IF NOT EXISTS transitions_appt_idx      ON appointment_transitions(appointment_id);
CREATE INDEX IF NOT EXISTS notifications_audience_idx ON notifications(audience, created_at);

PRAGMA user_version = 1;
";
