use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{success, warning};
use std::path::Path;
use std::process::Command;

pub struct ConfigLogic;

impl ConfigLogic {
    /// Effective configuration as YAML. Secrets are masked.
    pub fn render(cfg: &Config) -> AppResult<String> {
        let mut shown = cfg.clone();
        for secret in [&mut shown.cloud.client_secret, &mut shown.cloud.refresh_token] {
            if !secret.is_empty() {
                *secret = "********".to_string();
            }
        }
        Ok(serde_yaml::to_string(&shown)?)
    }

    fn default_editor() -> String {
        std::env::var("EDITOR")
            .or_else(|_| std::env::var("VISUAL"))
            .unwrap_or_else(|_| {
                if cfg!(target_os = "windows") {
                    "notepad".to_string()
                } else {
                    "nano".to_string()
                }
            })
    }

    /// Open the config file in `editor`, falling back to $EDITOR / $VISUAL / nano.
    pub fn edit(path: &Path, editor: Option<&str>) -> AppResult<()> {
        let fallback = Self::default_editor();
        let chosen = editor.map(str::to_string).unwrap_or_else(|| fallback.clone());

        match Command::new(&chosen).arg(path).status() {
            Ok(s) if s.success() => {
                success(format!("Configuration file edited using '{}'", chosen));
                return Ok(());
            }
            _ if chosen == fallback => {
                return Err(AppError::Config(format!("editor '{}' failed", chosen)));
            }
            _ => warning(format!(
                "Editor '{}' not available, falling back to '{}'",
                chosen, fallback
            )),
        }

        match Command::new(&fallback).arg(path).status() {
            Ok(s) if s.success() => {
                success(format!("Configuration file edited using fallback '{}'", fallback));
                Ok(())
            }
            _ => Err(AppError::Config(format!("editor '{}' failed", fallback))),
        }
    }
}
