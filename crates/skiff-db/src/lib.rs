//! skiff-db: SQLite-backed settings storage for Skiff.
//!
//! The orchestrator reads its tunables from the `settings` table; the
//! embedding application owns the database file.

pub mod schema;
pub mod settings;

use rusqlite::Connection;
use std::path::Path;

pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    schema::initialize(&conn)?;
    Ok(conn)
}

/// Open a throwaway database with the schema applied. Used by tests and by
/// hosts that run without persistent settings.
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::initialize(&conn)?;
    Ok(conn)
}
