use crate::cli::commands::open_db;
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::conflict::resolve_conflicts;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, success};
use chrono::Duration;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Resolve { window } = cmd {
        let secs = window.unwrap_or(cfg.reconcile.conflict_window_secs);
        if secs < 0 {
            return Err(AppError::Parse("--window must not be negative".into()));
        }

        let mut pool = open_db(cfg)?;
        let report = resolve_conflicts(&mut pool.conn, Duration::seconds(secs))?;

        for r in &report.retired {
            info(format!(
                "Retired device row {} ({} {} at {}) in favour of cloud row {}",
                r.device.id,
                r.device.employee_key,
                r.device.kind.pk_as_str(),
                r.device.time_str(),
                r.cloud_id
            ));
        }
        success(format!(
            "Resolve: {} device rows, {} cloud rows, {} retired (window {} s)",
            report.device_rows,
            report.cloud_rows,
            report.retired.len(),
            secs
        ));
    }
    Ok(())
}
