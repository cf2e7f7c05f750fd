use crate::errors::{AppError, AppResult};
use crate::models::event::{Candidate, Event, RawDetail};
use crate::models::origin::Origin;
use crate::models::punch_kind::PunchKind;
use crate::utils::time::{format_timestamp, parse_timestamp};
use chrono::{Local, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Result, Row, params};

const EVENT_COLUMNS: &str =
    "id, employee_key, display_name, event_time, punch_kind, synced, origin, created_at";

fn conversion_error(col: usize, err: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(err))
}

pub fn map_row(row: &Row) -> Result<Event> {
    let time_str: String = row.get("event_time")?;
    let event_time = parse_timestamp(&time_str).map_err(|e| conversion_error(3, e))?;

    let kind_raw: i64 = row.get("punch_kind")?;
    let kind = PunchKind::from_db_int(kind_raw)
        .ok_or_else(|| conversion_error(4, AppError::InvalidPunchKind(kind_raw.to_string())))?;

    let origin_str: String = row.get("origin")?;
    let origin = Origin::from_db_str(&origin_str)
        .ok_or_else(|| conversion_error(6, AppError::InvalidOrigin(origin_str.clone())))?;

    Ok(Event {
        id: row.get("id")?,
        employee_key: row.get("employee_key")?,
        display_name: row.get("display_name")?,
        event_time,
        kind,
        synced: row.get::<_, i64>("synced")? == 1,
        origin,
        created_at: row.get("created_at")?,
    })
}

fn collect_events(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> AppResult<Vec<Event>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, map_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Canonical ledger
// ---------------------------------------------------------------------------

/// Insert into `attendance_logs`, returning the new id.
pub fn insert_event(conn: &Connection, c: &Candidate) -> Result<i64> {
    let origin = c.origin();
    conn.execute(
        "INSERT INTO attendance_logs
            (employee_key, display_name, event_time, punch_kind, synced, origin, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            c.employee_key,
            c.display_name,
            format_timestamp(&c.event_time),
            c.kind.to_db_int(),
            origin.initially_synced() as i64,
            origin.to_db_str(),
            Local::now().to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Any-origin lookup on `(employee_key, event_time[, punch_kind])`.
pub fn exists_in_canonical(
    conn: &Connection,
    employee_key: i64,
    event_time: &NaiveDateTime,
    kind: Option<PunchKind>,
) -> Result<bool> {
    let t = format_timestamp(event_time);
    match kind {
        Some(k) => conn
            .prepare_cached(
                "SELECT 1 FROM attendance_logs
                 WHERE employee_key = ?1 AND event_time = ?2 AND punch_kind = ?3 LIMIT 1",
            )?
            .exists(params![employee_key, t, k.to_db_int()]),
        None => conn
            .prepare_cached(
                "SELECT 1 FROM attendance_logs
                 WHERE employee_key = ?1 AND event_time = ?2 LIMIT 1",
            )?
            .exists(params![employee_key, t]),
    }
}

/// Kind of the employee's most recent canonical row, any origin.
pub fn last_kind_for(conn: &Connection, employee_key: i64) -> Result<Option<PunchKind>> {
    let raw: Option<i64> = conn
        .prepare_cached(
            "SELECT punch_kind FROM attendance_logs
             WHERE employee_key = ?1
             ORDER BY event_time DESC, id DESC
             LIMIT 1",
        )?
        .query_row([employee_key], |row| row.get(0))
        .optional()?;
    Ok(raw.and_then(PunchKind::from_db_int))
}

/// Rows of one origin in ledger (id) order.
pub fn load_by_origin(conn: &Connection, origin: Origin) -> AppResult<Vec<Event>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM attendance_logs WHERE origin = ?1 ORDER BY id ASC"
    );
    collect_events(conn, &sql, &[&origin.to_db_str()])
}

pub fn fetch_unsynced(conn: &Connection) -> AppResult<Vec<Event>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM attendance_logs
         WHERE synced = 0
         ORDER BY event_time ASC, id ASC"
    );
    collect_events(conn, &sql, &[])
}

/// Returns true only when the flag actually moved false → true.
pub fn mark_synced(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn.execute(
        "UPDATE attendance_logs SET synced = 1 WHERE id = ?1 AND synced = 0",
        [id],
    )?;
    Ok(n == 1)
}

pub fn delete_event(conn: &Connection, id: i64) -> Result<usize> {
    conn.execute("DELETE FROM attendance_logs WHERE id = ?1", [id])
}

/// Optional filters for `list`.
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    pub origin: Option<Origin>,
    pub employee_key: Option<i64>,
    pub unsynced_only: bool,
}

pub fn load_events(conn: &Connection, filter: &EventFilter) -> AppResult<Vec<Event>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(o) = filter.origin {
        clauses.push("origin = ?");
        args.push(Box::new(o.to_db_str()));
    }
    if let Some(k) = filter.employee_key {
        clauses.push("employee_key = ?");
        args.push(Box::new(k));
    }
    if filter.unsynced_only {
        clauses.push("synced = 0");
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM attendance_logs {where_sql} ORDER BY event_time ASC, id ASC"
    );
    let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    collect_events(conn, &sql, &refs)
}

// ---------------------------------------------------------------------------
// Raw ledgers
// ---------------------------------------------------------------------------

pub fn exists_in_raw_device(
    conn: &Connection,
    employee_key: i64,
    event_time: &NaiveDateTime,
) -> Result<bool> {
    conn.prepare_cached(
        "SELECT 1 FROM raw_device_logs WHERE employee_key = ?1 AND event_time = ?2 LIMIT 1",
    )?
    .exists(params![employee_key, format_timestamp(event_time)])
}

pub fn exists_in_raw_cloud(
    conn: &Connection,
    employee_key: i64,
    event_time: &NaiveDateTime,
    kind: PunchKind,
) -> Result<bool> {
    conn.prepare_cached(
        "SELECT 1 FROM raw_cloud_logs
         WHERE employee_key = ?1 AND event_time = ?2 AND punch_kind = ?3 LIMIT 1",
    )?
    .exists(params![
        employee_key,
        format_timestamp(event_time),
        kind.to_db_int()
    ])
}

/// Raw cloud fence on the platform's own id: unmapped employees share key 0.
pub fn exists_in_raw_cloud_for(
    conn: &Connection,
    cloud_employee_id: &str,
    event_time: &NaiveDateTime,
    kind: PunchKind,
) -> Result<bool> {
    conn.prepare_cached(
        "SELECT 1 FROM raw_cloud_logs
         WHERE cloud_employee_id = ?1 AND event_time = ?2 AND punch_kind = ?3 LIMIT 1",
    )?
    .exists(params![
        cloud_employee_id,
        format_timestamp(event_time),
        kind.to_db_int()
    ])
}

/// Insert into the raw ledger matching the candidate's origin.
pub fn insert_raw(conn: &Connection, c: &Candidate) -> Result<()> {
    let now = Local::now().to_rfc3339();
    match &c.raw {
        RawDetail::Device { label } => {
            conn.execute(
                "INSERT INTO raw_device_logs
                    (employee_key, display_name, event_time, status, device_label, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    c.employee_key,
                    c.display_name,
                    format_timestamp(&c.event_time),
                    c.kind.pk_as_str(),
                    label,
                    now,
                ],
            )?;
        }
        RawDetail::Cloud { cloud_employee_id } => {
            conn.execute(
                "INSERT INTO raw_cloud_logs
                    (employee_key, cloud_employee_id, event_time, punch_kind, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    c.employee_key,
                    cloud_employee_id,
                    format_timestamp(&c.event_time),
                    c.kind.to_db_int(),
                    now,
                ],
            )?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Row count for one of our own tables (never user input).
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
}
