//! Cloud employee id ⇄ device employee key.

use crate::errors::AppResult;
use rusqlite::{Connection, OptionalExtension, params};

/// Key used for cloud events whose employee has no mapping yet.
pub const UNMAPPED_KEY: i64 = 0;

pub struct IdentityMapper<'c> {
    conn: &'c Connection,
}

impl<'c> IdentityMapper<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Never fails: a missing mapping (or a failed lookup) yields UNMAPPED_KEY
    /// so the event is still recorded and auditable.
    pub fn resolve(&self, cloud_employee_id: &str) -> i64 {
        match self.lookup(cloud_employee_id) {
            Ok(Some(key)) => key,
            Ok(None) => UNMAPPED_KEY,
            Err(e) => {
                tracing::error!(cloud_employee_id, error = %e, "mapping lookup failed");
                UNMAPPED_KEY
            }
        }
    }

    pub fn lookup(&self, cloud_employee_id: &str) -> AppResult<Option<i64>> {
        Ok(self
            .conn
            .prepare_cached("SELECT device_key FROM user_mapping WHERE cloud_employee_id = ?1")?
            .query_row([cloud_employee_id.trim()], |row| row.get(0))
            .optional()?)
    }

    /// Device key → cloud id. When several cloud ids map to one key the
    /// lexically smallest wins, so the answer is stable.
    pub fn reverse(&self, device_key: i64) -> AppResult<Option<String>> {
        Ok(self
            .conn
            .prepare_cached(
                "SELECT cloud_employee_id FROM user_mapping
                 WHERE device_key = ?1
                 ORDER BY cloud_employee_id ASC
                 LIMIT 1",
            )?
            .query_row([device_key], |row| row.get(0))
            .optional()?)
    }

    pub fn upsert(&self, cloud_employee_id: &str, device_key: i64) -> AppResult<()> {
        self.conn.execute(
            "INSERT INTO user_mapping (cloud_employee_id, device_key) VALUES (?1, ?2)
             ON CONFLICT(cloud_employee_id) DO UPDATE SET device_key = excluded.device_key",
            params![cloud_employee_id.trim(), device_key],
        )?;
        Ok(())
    }

    pub fn remove(&self, cloud_employee_id: &str) -> AppResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM user_mapping WHERE cloud_employee_id = ?1",
            [cloud_employee_id.trim()],
        )?;
        Ok(n > 0)
    }

    pub fn list(&self) -> AppResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT cloud_employee_id, device_key FROM user_mapping ORDER BY device_key, cloud_employee_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
