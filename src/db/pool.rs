//! SQLite connection wrapper (one scoped connection per invocation).

use crate::config::Config;
use rusqlite::{Connection, Result};
use std::path::Path;
use std::time::Duration;

pub struct DbPool {
    pub conn: Connection,
}

impl DbPool {
    pub fn new(path: &str) -> Result<Self> {
        Self::with_busy_timeout(path, Duration::from_millis(5000))
    }

    /// Open the configured database with the configured busy timeout.
    pub fn open(cfg: &Config) -> Result<Self> {
        Self::with_busy_timeout(
            &cfg.database,
            Duration::from_millis(cfg.db_busy_timeout_ms),
        )
    }

    pub fn with_busy_timeout(path: &str, timeout: Duration) -> Result<Self> {
        let conn = Connection::open(Path::new(path))?;
        // concurrent pollers wait on the RESERVED lock instead of failing
        conn.busy_timeout(timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// In-memory database, used by unit tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }
}
