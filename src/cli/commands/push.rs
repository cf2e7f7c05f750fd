use crate::cli::commands::open_db;
use crate::clients::cloud::{CloudClient, ZohoPeopleClient};
use crate::config::Config;
use crate::core::runner::push_with_roster;
use crate::errors::AppResult;
use crate::ui::messages::{success, warning};

pub fn handle(cfg: &Config) -> AppResult<()> {
    let pool = open_db(cfg)?;
    let client = ZohoPeopleClient::new(&cfg.cloud)?;
    let token = client.get_access_token()?;

    let r = push_with_roster(&pool.conn, &client, &token)?;
    let line = format!(
        "Push: {} pending, {} pushed, {} not in roster, {} rejected, {} failed",
        r.pending, r.pushed, r.not_in_roster, r.rejected, r.failed
    );
    if r.rejected + r.failed > 0 {
        warning(line);
    } else {
        success(line);
    }
    Ok(())
}
