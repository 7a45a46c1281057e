use rusqlite::{Connection, Result};

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize the database schema with required tables
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Single-row progress table; NULL means no block processed yet
    conn.execute(
        "CREATE TABLE IF NOT EXISTS progress (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_processed_block INTEGER,
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO progress (id, last_processed_block) VALUES (1, NULL)",
        [],
    )?;

    Ok(())
}

/// Bring an existing file up to `SCHEMA_VERSION`
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version < SCHEMA_VERSION {
        initialize_schema(conn)?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
    }

    Ok(())
}
