//! Database schema definitions
//!
//! This module contains the SQL schema for the proxy pool database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Validated proxy candidates, in rotation order
CREATE TABLE IF NOT EXISTS proxies (
    address TEXT NOT NULL,
    port INTEGER NOT NULL,
    protocol TEXT NOT NULL,
    last_validated_at TEXT,
    working_for_target INTEGER,
    position INTEGER NOT NULL,
    PRIMARY KEY (address, port)
);

CREATE INDEX IF NOT EXISTS idx_proxies_position ON proxies(position);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
