use crate::core::checkpoint::CheckpointStore;
use crate::db::queries::count_rows;
use crate::errors::AppResult;
use crate::utils::colors::{CYAN, GREEN, GREY, RESET, YELLOW};
use rusqlite::{Connection, OptionalExtension};
use std::fs;

const TABLES: [&str; 4] = [
    "attendance_logs",
    "raw_device_logs",
    "raw_cloud_logs",
    "user_mapping",
];

pub fn print_db_info(conn: &Connection, db_path: &str) -> AppResult<()> {
    println!();

    //
    // 1) FILE
    //
    let file_size = fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
    let file_mb = (file_size as f64) / (1024.0 * 1024.0);

    println!("{}• File:{} {}{}{}", CYAN, RESET, YELLOW, db_path, RESET);
    println!("{}• Size:{} {:.2} MB", CYAN, RESET, file_mb);

    //
    // 2) ROW COUNTS
    //
    println!("{}• Rows:{}", CYAN, RESET);
    for table in TABLES {
        let n = count_rows(conn, table)?;
        println!("    {:<16} {}{}{}", table, GREEN, n, RESET);
    }

    let unsynced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM attendance_logs WHERE synced = 0",
        [],
        |row| row.get(0),
    )?;
    println!("{}• Unsynced:{} {}{}{}", CYAN, RESET, YELLOW, unsynced, RESET);

    //
    // 3) LEDGER RANGE
    //
    let range: Option<(String, String)> = conn
        .query_row(
            "SELECT MIN(event_time), MAX(event_time) FROM attendance_logs HAVING COUNT(*) > 0",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (first, last) = range.unwrap_or_else(|| (format!("{GREY}--{RESET}"), format!("{GREY}--{RESET}")));
    println!("{}• Event range:{}", CYAN, RESET);
    println!("    from: {}", first);
    println!("    to:   {}", last);

    //
    // 4) CHECKPOINTS
    //
    println!("{}• Checkpoints:{}", CYAN, RESET);
    let checkpoints = CheckpointStore::new(conn).list()?;
    if checkpoints.is_empty() {
        println!("    {GREY}none{RESET}");
    }
    for (source, high_water) in checkpoints {
        println!("    {:<28} {}", source, high_water);
    }

    println!();
    Ok(())
}
