//! SQL schema for the clinic SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    phone         TEXT NOT NULL UNIQUE,
    email         TEXT UNIQUE,
    role          TEXT NOT NULL,   -- 'client' | 'consultant' | 'fulltime_consultant' | 'admin'
    password_hash TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS consultants (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL UNIQUE REFERENCES accounts(id),
    kind       TEXT NOT NULL,      -- 'fulltime' | 'parttime'
    verified   INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- One client profile per account.
CREATE TABLE IF NOT EXISTS clients (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id             INTEGER NOT NULL UNIQUE REFERENCES accounts(id),
    name                   TEXT NOT NULL,
    gender                 TEXT,
    birth_date             TEXT,            -- YYYY-MM-DD
    address                TEXT,
    contact_phone          TEXT NOT NULL,
    tags                   TEXT NOT NULL DEFAULT '[]',  -- JSON array of strings
    assigned_consultant_id INTEGER REFERENCES consultants(id),
    is_orphan              INTEGER NOT NULL DEFAULT 0,
    last_contact           TEXT,            -- fixed-width RFC 3339 UTC
    created_at             TEXT NOT NULL,
    updated_at             TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS clients_account_immutable
BEFORE UPDATE OF account_id ON clients
WHEN NEW.account_id != OLD.account_id
BEGIN
    SELECT RAISE(ABORT, 'client account_id is immutable');
END;

CREATE INDEX IF NOT EXISTS clients_consultant_idx ON clients(assigned_consultant_id);
CREATE INDEX IF NOT EXISTS clients_orphan_idx     ON clients(is_orphan, last_contact);

PRAGMA user_version = 1;
";
