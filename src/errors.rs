//! Unified application error type.
//! All modules (db, core, clients, cli) return AppError to keep the error
//! handling consistent and easy to manage.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Network or store unreachable: abort the current poll, retry next cycle.
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ---------------------------
    // Database-related
    // ---------------------------
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Database migration error: {0}")]
    Migration(String),

    /// A uniqueness constraint rejected a write believed to be novel.
    /// Callers translate it into an "already present" outcome.
    #[error("Data integrity violation: {0}")]
    DataIntegrityViolation(String),

    // ---------------------------
    // Collaborators
    // ---------------------------
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Device connection error: {0}")]
    DeviceConnection(String),

    // ---------------------------
    // Parsing errors
    // ---------------------------
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid punch kind: {0}")]
    InvalidPunchKind(String),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration")]
    ConfigLoad,

    #[error("Failed to save configuration")]
    ConfigSave,

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ---------------------------
    // Export errors
    // ---------------------------
    #[error("Export error: {0}")]
    Export(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

impl AppError {
    /// True for failures that leave no trace and are safe to retry next cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::TransientIo(_) | AppError::Io(_) | AppError::DeviceConnection(_) => true,
            AppError::Http(e) => !matches!(e.status(), Some(s) if s.is_client_error()),
            AppError::Db(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy)
                    | Some(rusqlite::ErrorCode::DatabaseLocked)
                    | Some(rusqlite::ErrorCode::CannotOpen)
            ),
            _ => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Auth(_))
    }
}

/// True when SQLite rejected a write because of a UNIQUE/CHECK constraint.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_is_not_transient() {
        let e = AppError::Auth("expired refresh token".into());
        assert!(e.is_auth());
        assert!(!e.is_transient());
    }

    #[test]
    fn device_connection_is_transient() {
        assert!(AppError::DeviceConnection("timeout".into()).is_transient());
        assert!(AppError::TransientIo("unreachable".into()).is_transient());
        assert!(!AppError::Config("bad".into()).is_transient());
    }

    #[test]
    fn unique_violation_is_detected() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k INTEGER UNIQUE); INSERT INTO t VALUES (1);")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES (1)", []).unwrap_err();
        assert!(is_constraint_violation(&err));
    }
}
