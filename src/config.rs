// ⚙️ Configuration - TOML file with environment overrides
//
// Lookup order: $CUSTOMER_SYNC_CONFIG, ./customer-sync.toml, built-in defaults.
// CUSTOMER_SYNC_DB and CUSTOMER_SYNC_BIND override the file afterwards.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "CUSTOMER_SYNC_CONFIG";
pub const DB_ENV: &str = "CUSTOMER_SYNC_DB";
pub const BIND_ENV: &str = "CUSTOMER_SYNC_BIND";
pub const DEFAULT_CONFIG_FILE: &str = "customer-sync.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SyncConfig {
    /// Name written into audit events
    #[serde(default = "default_actor")]
    pub actor: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub wal: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_actor() -> String {
    "customer-sync".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("customers.db")
}

fn default_true() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            actor: default_actor(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Resolve the configuration the binaries run with
    pub fn discover() -> Result<Self> {
        let config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        Ok(config.with_overrides(
            std::env::var(DB_ENV).ok(),
            std::env::var(BIND_ENV).ok(),
        ))
    }

    pub fn with_overrides(mut self, db_path: Option<String>, bind: Option<String>) -> Self {
        if let Some(path) = db_path {
            self.database.path = PathBuf::from(path);
        }
        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        self
    }
}
