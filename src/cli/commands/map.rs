use crate::cli::commands::open_db;
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::identity::IdentityMapper;
use crate::db::log::ttlog_or_warn;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, success, warning};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Map { add, remove, list } = cmd {
        let pool = open_db(cfg)?;
        let ids = IdentityMapper::new(&pool.conn);

        if let Some(pair) = add {
            let [cloud_id, key] = pair.as_slice() else {
                return Err(AppError::Parse("--add expects CLOUD_ID DEVICE_KEY".into()));
            };
            let cloud_id = cloud_id.trim();
            if cloud_id.is_empty() {
                return Err(AppError::Parse("cloud employee id must not be empty".into()));
            }
            let device_key: i64 = key
                .trim()
                .parse()
                .map_err(|_| AppError::Parse(format!("invalid device key: {}", key)))?;

            ids.upsert(cloud_id, device_key)?;
            ttlog_or_warn(&pool.conn, "map", cloud_id, &format!("mapped to device key {}", device_key));
            success(format!("{} → {}", cloud_id, device_key));
        }

        if let Some(cloud_id) = remove {
            if ids.remove(cloud_id)? {
                ttlog_or_warn(&pool.conn, "unmap", cloud_id.trim(), "mapping removed");
                success(format!("Mapping for {} removed", cloud_id.trim()));
            } else {
                warning(format!("No mapping for {}", cloud_id.trim()));
            }
        }

        if *list {
            let rows = ids.list()?;
            if rows.is_empty() {
                info("No mappings defined.");
            } else {
                println!("{:<20} | {:>10}", "cloud id", "device key");
                println!("{}", "-".repeat(33));
                for (cloud_id, key) in rows {
                    println!("{:<20} | {:>10}", cloud_id, key);
                }
            }
        }
    }
    Ok(())
}
