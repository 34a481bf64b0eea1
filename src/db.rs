//! Database module for parley
//!
//! Durable sink for conversation logs flushed at the end of each call.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite half-written.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Conversation Log Operations ====================

    /// Store the full log of one call, replacing any earlier flush of the same call
    pub fn save_conversation(&self, call_id: &str, entries: &[LogEntry]) -> DbResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now();

        tx.execute(
            "DELETE FROM conversation_entries WHERE call_id = ?1",
            params![call_id],
        )?;
        tx.execute(
            "INSERT INTO conversations (call_id, entry_count, flushed_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(call_id) DO UPDATE SET entry_count = ?2, flushed_at = ?3",
            params![call_id, entry_count(entries), now.to_rfc3339()],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO conversation_entries (call_id, sequence_id, timestamp, speaker, message)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (sequence_id, entry) in (0_i64..).zip(entries) {
                stmt.execute(params![
                    call_id,
                    sequence_id,
                    entry.timestamp.to_rfc3339(),
                    entry.speaker.as_str(),
                    entry.message,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get the stored log of one call, in insertion order
    pub fn get_conversation(&self, call_id: &str) -> DbResult<Vec<LogEntry>> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM conversations WHERE call_id = ?1)",
            params![call_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(DbError::ConversationNotFound(call_id.to_string()));
        }

        let mut stmt = conn.prepare(
            "SELECT timestamp, speaker, message FROM conversation_entries
             WHERE call_id = ?1 ORDER BY sequence_id ASC",
        )?;
        let rows = stmt.query_map(params![call_id], |row| {
            let speaker: String = row.get(1)?;
            Ok(LogEntry {
                timestamp: parse_datetime(&row.get::<_, String>(0)?),
                speaker: speaker.parse().unwrap_or(Speaker::TelephonySystem),
                message: row.get(2)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// List flushed conversations, most recent first
    pub fn list_conversations(&self) -> DbResult<Vec<ConversationSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT call_id, entry_count, flushed_at FROM conversations ORDER BY flushed_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ConversationSummary {
                call_id: row.get(0)?,
                entry_count: row.get(1)?,
                flushed_at: parse_datetime(&row.get::<_, String>(2)?),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn entry_count(entries: &[LogEntry]) -> i64 {
    i64::try_from(entries.len()).unwrap_or(i64::MAX)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
