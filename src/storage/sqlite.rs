//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ProxyStore trait.

use crate::proxy::{ProxyCandidate, ProxyProtocol};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ProxyStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite proxy pool backend
pub struct SqliteProxyStore {
    conn: Mutex<Connection>,
}

impl SqliteProxyStore {
    /// Opens (or creates) the proxy database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("proxy store lock poisoned".to_string()))
    }
}

impl ProxyStore for SqliteProxyStore {
    fn load(&self) -> StorageResult<Vec<ProxyCandidate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT address, port, protocol, last_validated_at, working_for_target
             FROM proxies ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u16>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<bool>>(4)?,
            ))
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            let (address, port, protocol, validated_at, working) = row?;

            let Some(protocol) = ProxyProtocol::parse(&protocol) else {
                tracing::debug!("Skipping stored proxy {}:{} with protocol {}", address, port, protocol);
                continue;
            };

            let last_validated_at = validated_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            candidates.push(ProxyCandidate {
                address,
                port,
                protocol,
                last_validated_at,
                working_for_target: working,
            });
        }

        Ok(candidates)
    }

    fn replace_all(&self, candidates: &[ProxyCandidate]) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM proxies", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO proxies
                 (address, port, protocol, last_validated_at, working_for_target, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for (position, c) in candidates.iter().enumerate() {
                stmt.execute(params![
                    c.address,
                    c.port,
                    c.protocol.as_str(),
                    c.last_validated_at.map(|t| t.to_rfc3339()),
                    c.working_for_target,
                    position as i64,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn remove(&self, address: &str, port: u16) -> StorageResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM proxies WHERE address = ?1 AND port = ?2",
            params![address, port],
        )?;
        Ok(removed > 0)
    }
}
