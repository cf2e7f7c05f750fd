use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::config::ConfigLogic;
use crate::errors::AppResult;
use crate::ui::messages::warning;
use std::path::Path;

/// Handle the `config` subcommand
pub fn handle(cmd: &Commands, cfg: &Config, config_path: &Path) -> AppResult<()> {
    if let Commands::Config {
        print_config,
        edit_config,
        editor,
    } = cmd
    {
        if *print_config {
            println!("📄 Current configuration ({}):\n", config_path.display());
            println!("{}", ConfigLogic::render(cfg)?);
        }

        if *edit_config {
            if !config_path.exists() {
                warning(format!(
                    "{} does not exist yet, run `punchsync init` first",
                    config_path.display()
                ));
                return Ok(());
            }
            ConfigLogic::edit(config_path, editor.as_deref())?;
        }
    }

    Ok(())
}
