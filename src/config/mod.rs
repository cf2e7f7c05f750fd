use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_busy_timeout")]
    pub db_busy_timeout_ms: u64,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Terminal export location (USB dump or network share).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    /// Recorded in raw_device_logs.device_label
    #[serde(default = "default_device_label")]
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_token_timeout")]
    pub token_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_fetch_duration")]
    pub fetch_duration: u32,
    #[serde(default = "default_lookback_days")]
    pub initial_lookback_days: i64,
    #[serde(default = "default_page_size")]
    pub roster_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_conflict_window")]
    pub conflict_window_secs: i64,
}

fn default_database() -> String {
    Config::database_file().to_string_lossy().to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_busy_timeout() -> u64 {
    5000
}
fn default_export_dir() -> String {
    Config::config_dir()
        .join("device")
        .to_string_lossy()
        .to_string()
}
fn default_device_label() -> String {
    "terminal-1".to_string()
}
fn default_domain() -> String {
    "zoho.com".to_string()
}
fn default_token_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    20
}
fn default_fetch_duration() -> u32 {
    200
}
fn default_lookback_days() -> i64 {
    30
}
fn default_page_size() -> u32 {
    200
}
fn default_conflict_window() -> i64 {
    1800
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            label: default_device_label(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            token_timeout_secs: default_token_timeout(),
            request_timeout_secs: default_request_timeout(),
            fetch_duration: default_fetch_duration(),
            initial_lookback_days: default_lookback_days(),
            roster_page_size: default_page_size(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            conflict_window_secs: default_conflict_window(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            log_level: default_log_level(),
            db_busy_timeout_ms: default_busy_timeout(),
            device: DeviceConfig::default(),
            cloud: CloudConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl Config {
    /// Return the standard configuration directory (~/.punchsync)
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".punchsync")
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("punchsync.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("punchsync.sqlite")
    }

    /// Load configuration from the standard location, or defaults if not found
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_file())
    }

    /// Load configuration from an explicit file, or defaults if it does not exist
    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|_| AppError::ConfigLoad)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> AppResult<Self> {
        let cfg: Config = serde_yaml::from_str(content)
            .map_err(|e| AppError::Config(format!("invalid configuration: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> AppResult<()> {
        if self.reconcile.conflict_window_secs < 0 {
            return Err(AppError::Config(
                "reconcile.conflict_window_secs must not be negative".into(),
            ));
        }
        if self.cloud.roster_page_size == 0 {
            return Err(AppError::Config(
                "cloud.roster_page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Credentials from the process environment win over the file.
    /// Called once by `run()`; core code never reads the environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ZOHO_CLIENT_ID") {
            self.cloud.client_id = v;
        }
        if let Some(v) = lookup("ZOHO_CLIENT_SECRET") {
            self.cloud.client_secret = v;
        }
        if let Some(v) = lookup("ZOHO_REFRESH_TOKEN") {
            self.cloud.refresh_token = v;
        }
        if let Some(v) = lookup("ZOHO_DOMAIN") {
            self.cloud.domain = v;
        }
    }

    /// Initialize configuration and database files
    pub fn init_all(
        config_path: &Path,
        custom_db: Option<String>,
        is_test: bool,
    ) -> AppResult<Config> {
        let dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_dir);
        fs::create_dir_all(&dir)?;

        // DB name: user provided or default
        let db_path = match custom_db {
            Some(name) => {
                let p = Path::new(&name);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    dir.join(p)
                }
            }
            None => dir.join("punchsync.sqlite"),
        };

        let config = Config {
            database: db_path.to_string_lossy().to_string(),
            ..Config::default()
        };

        // Write config file
        if !is_test {
            let yaml = serde_yaml::to_string(&config).map_err(|_| AppError::ConfigSave)?;
            let mut file = fs::File::create(config_path)?;
            file.write_all(yaml.as_bytes())?;
            println!("✅ Config file: {:?}", config_path);
        }

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        println!("✅ Database:    {:?}", db_path);

        Ok(config)
    }
}
