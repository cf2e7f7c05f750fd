use crate::core::checkpoint::CheckpointStore;
use crate::db::log::ttlog_or_warn;
use crate::errors::{AppError, AppResult};
use crate::utils::time::{format_timestamp, parse_timestamp};
use chrono::Local;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use std::fs;
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::FileOptions;

/// Tables exported incrementally, each keyed on its `event_time` column.
pub const BACKUP_TABLES: [&str; 3] = ["attendance_logs", "raw_device_logs", "raw_cloud_logs"];

#[derive(Debug, Clone)]
pub struct TableBackup {
    pub table: String,
    pub rows: usize,
    pub file: PathBuf,
}

pub struct BackupLogic;

impl BackupLogic {
    /// Export rows newer than each table's backup checkpoint as SQL INSERT
    /// files under `dir`. Tables without new rows produce no file.
    pub fn backup(conn: &Connection, dir: &Path, compress: bool) -> AppResult<Vec<TableBackup>> {
        fs::create_dir_all(dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        let mut done = Vec::new();
        for table in BACKUP_TABLES {
            if let Some(b) = backup_table(conn, table, dir, compress, &stamp)? {
                done.push(b);
            }
        }
        Ok(done)
    }
}

fn backup_table(
    conn: &Connection,
    table: &str,
    dir: &Path,
    compress: bool,
    stamp: &str,
) -> AppResult<Option<TableBackup>> {
    let source = format!("backup:{}", table);
    let store = CheckpointStore::new(conn);
    let since = store.read(&source);

    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {} WHERE event_time > ?1 ORDER BY event_time ASC",
        table
    ))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let time_idx = columns
        .iter()
        .position(|c| c == "event_time")
        .ok_or_else(|| AppError::Export(format!("{} has no event_time column", table)))?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut last_time = String::new();
    let mut q = stmt.query([format_timestamp(&since)])?;
    while let Some(row) = q.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(sql_literal(row.get_ref(i)?));
        }
        last_time = row.get(time_idx)?;
        rows.push(values);
    }

    if rows.is_empty() {
        tracing::info!(table, since = %format_timestamp(&since), "no new rows");
        return Ok(None);
    }

    let path = dir.join(format!("{}_increment_{}.sql", table, stamp));
    fs::write(&path, render_insert(table, &columns, &rows))?;

    let file = if compress {
        let zipped = compress_file(&path)?;
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!(file = %path.display(), error = %e, "failed to remove uncompressed export");
        }
        zipped
    } else {
        path
    };

    // only after the file is on disk
    store.write(&source, &parse_timestamp(&last_time)?)?;

    ttlog_or_warn(
        conn,
        "backup",
        &file.to_string_lossy(),
        &format!("{} rows from {}", rows.len(), table),
    );

    Ok(Some(TableBackup {
        table: table.to_string(),
        rows: rows.len(),
        file,
    }))
}

/// SQL literal for one column value: `NULL`, numbers as-is, text quoted
/// with `''` escaping, blobs as `X'..'`.
pub fn sql_literal(v: ValueRef<'_>) -> String {
    match v {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t).replace('\'', "''")),
        ValueRef::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
            format!("X'{}'", hex)
        }
    }
}

/// One multi-row INSERT statement.
pub fn render_insert(table: &str, columns: &[String], rows: &[Vec<String>]) -> String {
    let values: Vec<String> = rows.iter().map(|r| format!("({})", r.join(", "))).collect();
    format!(
        "INSERT INTO {} ({}) VALUES\n{};\n",
        table,
        columns.join(", "),
        values.join(",\n")
    )
}

/// Wrap a file into `<name>.zip` next to it.
fn compress_file(path: &Path) -> AppResult<PathBuf> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| AppError::Export(format!("invalid export path: {}", path.display())))?;

    let zip_path = path.with_extension("zip");
    let file = fs::File::create(&zip_path)?;
    let mut zip = ZipWriter::new(file);

    let options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut f = fs::File::open(path)?;
    zip.start_file(name, options)?;
    std::io::copy(&mut f, &mut zip)?;
    zip.finish()?;

    Ok(zip_path)
}
