//! punchsync library root.
//! Exposes the reconciliation engine, its collaborator clients, the CLI
//! parser and the high-level run() function.

pub mod cli;
pub mod clients;
pub mod config;
pub mod core;
pub mod db;
pub mod errors;
pub mod models;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::parser::{Cli, Commands};
use config::Config;
use errors::AppResult;
use std::path::{Path, PathBuf};

/// Central command dispatcher
pub fn dispatch(cli: &Cli, cfg: &Config, config_path: &Path) -> AppResult<()> {
    match &cli.command {
        Commands::Init => cli::commands::init::handle(cli, config_path),
        Commands::Config { .. } => cli::commands::config::handle(&cli.command, cfg, config_path),
        Commands::Db { .. } => cli::commands::db::handle(&cli.command, cfg),
        Commands::Log { .. } => cli::commands::log::handle(&cli.command, cfg),
        Commands::Map { .. } => cli::commands::map::handle(&cli.command, cfg),
        Commands::PollDevice { .. } => cli::commands::poll::handle_device(&cli.command, cfg),
        Commands::PollCloud => cli::commands::poll::handle_cloud(cfg),
        Commands::Resolve { .. } => cli::commands::resolve::handle(&cli.command, cfg),
        Commands::Push => cli::commands::push::handle(cfg),
        Commands::Run { .. } => cli::commands::run::handle(&cli.command, cfg),
        Commands::List { .. } => cli::commands::list::handle(&cli.command, cfg),
        Commands::Backup { .. } => cli::commands::backup::handle(&cli.command, cfg),
    }
}

/// Configuration file in effect: `--config`, else the standard location.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_file)
}

/// Load the configuration once, with environment credentials and the
/// `--db` override applied.
pub fn load_config(cli: &Cli) -> AppResult<Config> {
    let mut cfg = Config::load_from(&config_path(cli))?;
    cfg.apply_env_overrides(|k| std::env::var(k).ok().filter(|v| !v.is_empty()));

    if let Some(custom_db) = &cli.db {
        cfg.database = custom_db.clone();
    }
    Ok(cfg)
}

/// Entry point used by main.rs
pub fn run(cli: &Cli) -> AppResult<()> {
    let cfg = load_config(cli)?;
    dispatch(cli, &cfg, &config_path(cli))
}

/// Parse the process arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
