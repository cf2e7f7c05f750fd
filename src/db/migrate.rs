use crate::ui::messages::success;
use rusqlite::{Connection, OptionalExtension, Result};

/// Ensure that the `log` table exists. Migration markers live there.
fn ensure_log_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Canonical ledger plus the two raw ledgers.
/// The UNIQUE constraints are the last line of defense against duplicates.
fn create_ledgers(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_logs (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_key  INTEGER NOT NULL,
            display_name  TEXT NOT NULL DEFAULT '',
            event_time    TEXT NOT NULL,
            punch_kind    INTEGER NOT NULL CHECK(punch_kind IN (0, 1)),
            synced        INTEGER NOT NULL DEFAULT 0 CHECK(synced IN (0, 1)),
            origin        TEXT NOT NULL CHECK(origin IN ('device', 'cloud')),
            created_at    TEXT NOT NULL,
            UNIQUE(employee_key, event_time, origin)
        );

        CREATE INDEX IF NOT EXISTS idx_attendance_emp_time ON attendance_logs(employee_key, event_time);
        CREATE INDEX IF NOT EXISTS idx_attendance_synced ON attendance_logs(synced, event_time);

        CREATE TABLE IF NOT EXISTS raw_device_logs (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_key  INTEGER NOT NULL,
            display_name  TEXT NOT NULL DEFAULT '',
            event_time    TEXT NOT NULL,
            status        TEXT NOT NULL,
            device_label  TEXT NOT NULL DEFAULT '',
            ingested_at   TEXT NOT NULL,
            UNIQUE(employee_key, event_time)
        );

        CREATE TABLE IF NOT EXISTS raw_cloud_logs (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_key       INTEGER NOT NULL,
            cloud_employee_id  TEXT NOT NULL,
            event_time         TEXT NOT NULL,
            punch_kind         INTEGER NOT NULL CHECK(punch_kind IN (0, 1)),
            ingested_at        TEXT NOT NULL,
            UNIQUE(employee_key, event_time, punch_kind)
        );
        "#,
    )?;
    Ok(())
}

fn create_checkpoints_and_mapping(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            source      TEXT PRIMARY KEY,
            high_water  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_mapping (
            cloud_employee_id  TEXT PRIMARY KEY,
            device_key         INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_user_mapping_device ON user_mapping(device_key);
        "#,
    )?;
    Ok(())
}

/// Raw cloud rows are fenced per cloud employee: unmapped employees share
/// key 0, and each of their entries must keep its own raw row.
fn fence_raw_cloud_on_cloud_id(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE raw_cloud_logs_new (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_key       INTEGER NOT NULL,
            cloud_employee_id  TEXT NOT NULL,
            event_time         TEXT NOT NULL,
            punch_kind         INTEGER NOT NULL CHECK(punch_kind IN (0, 1)),
            ingested_at        TEXT NOT NULL,
            UNIQUE(cloud_employee_id, event_time, punch_kind)
        );

        INSERT OR IGNORE INTO raw_cloud_logs_new
            (id, employee_key, cloud_employee_id, event_time, punch_kind, ingested_at)
        SELECT id, employee_key, cloud_employee_id, event_time, punch_kind, ingested_at
        FROM raw_cloud_logs;

        DROP TABLE raw_cloud_logs;
        ALTER TABLE raw_cloud_logs_new RENAME TO raw_cloud_logs;

        CREATE INDEX IF NOT EXISTS idx_raw_cloud_emp_time ON raw_cloud_logs(employee_key, event_time);
        "#,
    )?;
    Ok(())
}

type Step = fn(&Connection) -> Result<()>;

/// Ordered list of named migrations. Names are never reused.
const MIGRATIONS: &[(&str, &str, Step)] = &[
    (
        "20251019_0001_create_ledgers",
        "Created attendance_logs, raw_device_logs, raw_cloud_logs",
        create_ledgers,
    ),
    (
        "20251019_0002_create_checkpoints_and_mapping",
        "Created checkpoints and user_mapping",
        create_checkpoints_and_mapping,
    ),
    (
        "20251019_0003_fence_raw_cloud_on_cloud_id",
        "raw_cloud_logs unique per cloud employee id",
        fence_raw_cloud_on_cloud_id,
    ),
];

fn is_applied(conn: &Connection, version: &str) -> Result<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log
         WHERE operation = 'migration_applied' AND target = ?1
         LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

/// Run every pending migration, in order. Called by `init_db`.
pub fn run_pending_migrations(conn: &Connection) -> Result<usize> {
    ensure_log_table(conn)?;

    let mut applied = 0;
    for (version, message, step) in MIGRATIONS {
        if is_applied(conn, version)? {
            continue;
        }

        // step + marker in one transaction: a crash never leaves a half-applied version
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        let outcome = step(conn).and_then(|_| {
            conn.execute(
                "INSERT INTO log (date, operation, target, message)
                 VALUES (datetime('now'), 'migration_applied', ?1, ?2)",
                [version, message],
            )
        });

        match outcome {
            Ok(_) => {
                conn.execute_batch("COMMIT;")?;
                success(format!("Migration applied: {} → {}", version, message));
                applied += 1;
            }
            Err(e) => {
                conn.execute_batch("ROLLBACK;").ok();
                return Err(e);
            }
        }
    }

    Ok(applied)
}
