//! Biometric terminal access.
//!
//! A session pauses on-device logging while it is open; `release` must run on
//! every exit path or the terminal stops recording punches. `SessionGuard`
//! does that from `Drop`.

use crate::errors::{AppError, AppResult};
use crate::models::event::RawPunch;
use crate::utils::time::parse_timestamp;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const ATTLOG_FILE: &str = "attlog.dat";
pub const USERS_FILE: &str = "users.csv";

pub trait DeviceClient {
    fn connect(&self) -> AppResult<Box<dyn DeviceSession>>;
}

pub trait DeviceSession {
    fn fetch_punches(&mut self) -> AppResult<Vec<RawPunch>>;
    /// employee key → display name
    fn fetch_roster(&mut self) -> AppResult<HashMap<i64, String>>;
    /// Resume device logging and disconnect.
    fn release(&mut self) -> AppResult<()>;
}

/// Releases the wrapped session exactly once: explicitly via `release`, or on drop.
pub struct SessionGuard {
    session: Box<dyn DeviceSession>,
    released: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn DeviceSession>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    pub fn fetch_punches(&mut self) -> AppResult<Vec<RawPunch>> {
        self.session.fetch_punches()
    }

    pub fn fetch_roster(&mut self) -> AppResult<HashMap<i64, String>> {
        self.session.fetch_roster()
    }

    pub fn release(mut self) -> AppResult<()> {
        self.released = true;
        self.session.release()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.session.release() {
            tracing::error!(error = %e, "failed to release device session");
        }
    }
}

// ---------------------------------------------------------------------------
// Export directory adapter
// ---------------------------------------------------------------------------

/// Reads a terminal export: `attlog.dat` (tab separated, `user_id` then
/// `YYYY-MM-DD HH:MM:SS`, trailing columns ignored) and an optional
/// `users.csv` with a `user_id,name` header.
pub struct ExportDirDevice {
    dir: PathBuf,
}

impl ExportDirDevice {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl DeviceClient for ExportDirDevice {
    fn connect(&self) -> AppResult<Box<dyn DeviceSession>> {
        if !self.dir.is_dir() {
            return Err(AppError::DeviceConnection(format!(
                "export directory not found: {}",
                self.dir.display()
            )));
        }
        tracing::debug!(dir = %self.dir.display(), "device export opened");
        Ok(Box::new(ExportDirSession {
            dir: self.dir.clone(),
        }))
    }
}

struct ExportDirSession {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    user_id: i64,
    name: String,
}

impl DeviceSession for ExportDirSession {
    fn fetch_punches(&mut self) -> AppResult<Vec<RawPunch>> {
        let path = self.dir.join(ATTLOG_FILE);
        let file = File::open(&path).map_err(|e| {
            AppError::DeviceConnection(format!("cannot read {}: {}", path.display(), e))
        })?;
        read_attlog(file, &path)
    }

    fn fetch_roster(&mut self) -> AppResult<HashMap<i64, String>> {
        let path = self.dir.join(USERS_FILE);
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)?;

        let mut roster = HashMap::new();
        for rec in rdr.deserialize::<UserRecord>() {
            let rec = rec?;
            roster.insert(rec.user_id, rec.name);
        }
        Ok(roster)
    }

    fn release(&mut self) -> AppResult<()> {
        tracing::debug!(dir = %self.dir.display(), "device export released");
        Ok(())
    }
}

/// Parse `attlog.dat`. Malformed lines are logged and skipped.
pub fn read_attlog<R: std::io::Read>(reader: R, origin: &Path) -> AppResult<Vec<RawPunch>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut out = Vec::new();
    for (n, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let (Some(id), Some(ts)) = (rec.get(0), rec.get(1)) else {
            tracing::warn!(file = %origin.display(), line = n + 1, "short attlog line skipped");
            continue;
        };

        match (id.parse::<i64>(), parse_timestamp(ts)) {
            (Ok(key), Ok(at)) => out.push(RawPunch::new(key, at)),
            _ => {
                tracing::warn!(
                    file = %origin.display(),
                    line = n + 1,
                    user_id = id,
                    timestamp = ts,
                    "malformed attlog line skipped"
                );
            }
        }
    }
    Ok(out)
}
