pub mod backup;
pub mod config;
pub mod db;
pub mod init;
pub mod list;
pub mod log;
pub mod map;
pub mod poll;
pub mod push;
pub mod resolve;
pub mod run;

use crate::config::Config;
use crate::db::initialize::init_db;
use crate::db::pool::DbPool;
use crate::errors::AppResult;

/// Open the configured database with pending migrations applied.
pub(crate) fn open_db(cfg: &Config) -> AppResult<DbPool> {
    let pool = DbPool::open(cfg)?;
    init_db(&pool.conn)?;
    Ok(pool)
}
