use crate::cli::commands::open_db;
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::backup::BackupLogic;
use crate::errors::AppResult;
use crate::ui::messages::{info, success};
use std::path::Path;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Backup { dir, compress } = cmd {
        let pool = open_db(cfg)?;
        let written = BackupLogic::backup(&pool.conn, Path::new(dir), *compress)?;

        if written.is_empty() {
            info("No new rows since the last backup.");
        }
        for b in written {
            success(format!("{}: {} rows → {}", b.table, b.rows, b.file.display()));
        }
    }

    Ok(())
}
