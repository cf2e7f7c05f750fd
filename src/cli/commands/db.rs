use crate::cli::commands::open_db;
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::db::log::ttlog_or_warn;
use crate::db::migrate::run_pending_migrations;
use crate::db::pool::DbPool;
use crate::db::stats;
use crate::errors::AppResult;
use crate::ui::messages::{error, info, success};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Db {
        migrate,
        check,
        vacuum,
        info: show_info,
    } = cmd
    {
        // --migrate opens the raw file: open_db would apply them silently
        let pool = if *migrate {
            let pool = DbPool::open(cfg)?;
            info("Running migrations…");
            let n = run_pending_migrations(&pool.conn)?;
            success(format!("Migration completed ({} applied).", n));
            pool
        } else {
            open_db(cfg)?
        };

        if *show_info {
            stats::print_db_info(&pool.conn, &cfg.database)?;
        }

        if *check {
            info("Running integrity check…");
            let integrity: String = pool
                .conn
                .query_row("PRAGMA integrity_check;", [], |row| row.get(0))?;

            if integrity == "ok" {
                success("Integrity check passed.");
            } else {
                error(format!("Integrity check failed: {}", integrity));
            }
            ttlog_or_warn(&pool.conn, "db_check", &cfg.database, &integrity);
        }

        if *vacuum {
            info("Running VACUUM…");
            pool.conn.execute_batch("VACUUM;")?;
            success("Vacuum completed.");
        }
    }

    Ok(())
}
