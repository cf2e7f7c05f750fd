//! Per-source high-water marks for incremental polling.

use crate::errors::AppResult;
use crate::utils::time::{epoch, format_timestamp, parse_timestamp};
use chrono::{Local, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, params};

pub struct CheckpointStore<'c> {
    conn: &'c Connection,
}

impl<'c> CheckpointStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Last absorbed event time. Unknown source or read failure ⇒ epoch,
    /// which means "poll everything"; dedup absorbs the re-delivery.
    pub fn read(&self, source: &str) -> NaiveDateTime {
        match self.try_read(source) {
            Ok(Some(t)) => t,
            Ok(None) => epoch(),
            Err(e) => {
                tracing::warn!(source, error = %e, "checkpoint read failed, polling from epoch");
                epoch()
            }
        }
    }

    pub fn try_read(&self, source: &str) -> AppResult<Option<NaiveDateTime>> {
        let raw: Option<String> = self
            .conn
            .prepare_cached("SELECT high_water FROM checkpoints WHERE source = ?1")?
            .query_row([source], |row| row.get(0))
            .optional()?;

        match raw {
            Some(s) => Ok(Some(parse_timestamp(&s)?)),
            None => Ok(None),
        }
    }

    /// Advance the mark. An earlier `time` leaves the stored value untouched.
    pub fn write(&self, source: &str, time: &NaiveDateTime) -> AppResult<NaiveDateTime> {
        // fixed-width timestamps: MAX() on TEXT is MAX() on time
        self.conn.execute(
            "INSERT INTO checkpoints (source, high_water, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(source) DO UPDATE SET
                 high_water = MAX(checkpoints.high_water, excluded.high_water),
                 updated_at = excluded.updated_at",
            params![source, format_timestamp(time), Local::now().to_rfc3339()],
        )?;

        Ok(self.try_read(source)?.unwrap_or(*time))
    }

    /// All checkpoints, for `db --info`.
    pub fn list(&self) -> AppResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, high_water FROM checkpoints ORDER BY source ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
