use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::init_db;
use crate::error::Result;

/// Thread-safe handle over the engine's database.
///
/// Wraps a single SQLite connection in a `Mutex`. Each job run holds the
/// store for its duration; the jobs are sequential batch work, so a mutex
/// is sufficient — no pool needed.
pub struct Store {
    pub(crate) db: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file, apply pragmas and run the
    /// idempotent schema migrations.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// In-memory database with the full schema — test fixtures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Wrap an already-open connection, running migrations on it.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

/// Render a UTC instant for storage. All timestamp columns hold this format
/// so lexicographic comparison in SQL matches chronological order.
pub(crate) fn fmt_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn fmt_utc_opt(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(fmt_utc)
}

/// Parse a stored timestamp back into UTC, reporting the column index on
/// failure so the offending row is identifiable.
pub(crate) fn parse_utc(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn parse_utc_opt(
    idx: usize,
    text: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    text.map(|t| parse_utc(idx, &t)).transpose()
}
