use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::database::schema::{initialize_schema, run_migrations};
use crate::logging::LogContext;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection failed: {0}")]
    Connection(#[from] rusqlite::Error),
    #[error("Database operation failed: {0}")]
    Operation(String),
    #[error("Progress regression: stored {current}, attempted {attempted}")]
    Regression { current: u64, attempted: u64 },
}

/// Durable "last successfully processed block" marker
pub trait ProgressStore: Send + Sync {
    /// `None` when no block has been processed yet
    fn load(&self) -> Result<Option<u64>, DbError>;

    /// Persist a new height. Heights below the stored one are rejected.
    fn save(&self, height: u64) -> Result<(), DbError>;
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file and initialize schema
    pub fn new(db_path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database for testing
    pub fn new_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Open the configured file with its busy timeout and journal mode
    pub fn with_config(config: &DatabaseConfig) -> Result<Self, DbError> {
        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms as u64))?;

        if config.enable_wal_mode {
            let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
            LogContext::new("database", "open")
                .with_metadata("path", serde_json::json!(config.path))
                .with_metadata("journal_mode", serde_json::json!(mode))
                .debug("Journal mode set");
        }

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        initialize_schema(&conn)?;
        run_migrations(&conn)?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn
            .lock()
            .map_err(|_| DbError::Operation("Failed to acquire lock".to_string()))
    }

    /// Get the last processed block number
    pub fn get_last_processed_block(&self) -> Result<Option<u64>, DbError> {
        let conn = self.lock()?;
        read_progress(&conn)
    }

    /// Overwrite the last processed block without the regression check.
    /// `None` makes the next run start from block 0.
    pub fn set_last_processed_block(&self, block_number: Option<u64>) -> Result<(), DbError> {
        let conn = self.lock()?;
        write_progress(&conn, block_number)?;

        LogContext::new("database", "set_last_processed_block")
            .with_metadata("block_number", serde_json::json!(block_number))
            .warn("Progress overwritten");
        Ok(())
    }
}

fn read_progress(conn: &Connection) -> Result<Option<u64>, DbError> {
    let block_number: Option<u64> = conn.query_row(
        "SELECT last_processed_block FROM progress WHERE id = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(block_number)
}

fn write_progress(conn: &Connection, block_number: Option<u64>) -> Result<(), DbError> {
    let updated = conn.execute(
        "UPDATE progress SET last_processed_block = ?1, updated_at = strftime('%s', 'now') WHERE id = 1",
        params![block_number],
    )?;

    if updated != 1 {
        return Err(DbError::Operation("progress row missing".to_string()));
    }
    Ok(())
}

impl ProgressStore for Database {
    fn load(&self) -> Result<Option<u64>, DbError> {
        self.get_last_processed_block()
    }

    fn save(&self, height: u64) -> Result<(), DbError> {
        let conn = self.lock()?;

        match read_progress(&conn)? {
            Some(current) if height < current => {
                return Err(DbError::Regression {
                    current,
                    attempted: height,
                })
            }
            Some(current) if height == current => return Ok(()),
            _ => {}
        }

        write_progress(&conn, Some(height))
    }
}
