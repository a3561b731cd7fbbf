use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use yamon_common::env::{parse_flag, parse_interval_secs};
use yamon_common::HashKey;
use yamon_storage::InMemoryStoreConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    #[serde(default = "default_address")]
    pub address: String,
    /// Seconds between snapshots; 0 flushes after every write.
    #[serde(default = "default_store_interval_secs")]
    pub store_interval_secs: u64,
    /// Snapshot file; empty disables persistence.
    #[serde(default = "default_store_file")]
    pub store_file: String,
    #[serde(default = "default_restore")]
    pub restore: bool,
    /// Shared signing key; empty or absent disables verification.
    #[serde(default)]
    pub hash_key: Option<String>,
    /// SQLite database file. When set it replaces the in-memory store and
    /// snapshot file.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_store_interval_secs() -> u64 {
    300
}

fn default_store_file() -> String {
    "/tmp/devops-metrics-db.json".to_string()
}

fn default_restore() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            store_interval_secs: default_store_interval_secs(),
            store_file: default_store_file(),
            restore: default_restore(),
            hash_key: None,
            database_path: None,
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {path}"))?;
        Ok(config)
    }

    /// File named on the command line (must exist), else the default path if
    /// present, else built-in defaults; then environment overrides.
    pub fn resolve(explicit_path: Option<&str>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `ADDRESS`, `STORE_INTERVAL`, `STORE_FILE`, `RESTORE`, `KEY`,
    /// `DATABASE_DSN` and `LOG_LEVEL` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(address) = lookup("ADDRESS") {
            self.address = address;
        }
        if let Some(raw) = lookup("STORE_INTERVAL") {
            self.store_interval_secs = parse_interval_secs(&raw)
                .with_context(|| format!("Invalid STORE_INTERVAL: {raw}"))?;
        }
        if let Some(file) = lookup("STORE_FILE") {
            self.store_file = file;
        }
        if let Some(raw) = lookup("RESTORE") {
            self.restore = parse_flag(&raw).with_context(|| format!("Invalid RESTORE: {raw}"))?;
        }
        if let Some(key) = lookup("KEY") {
            self.hash_key = Some(key);
        }
        if let Some(dsn) = lookup("DATABASE_DSN") {
            self.database_path = Some(dsn).filter(|d| !d.is_empty());
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.address.trim().is_empty(), "address must not be empty");
        Ok(())
    }

    pub fn hash_key(&self) -> Option<HashKey> {
        self.hash_key.as_deref().and_then(HashKey::new)
    }

    pub fn store_config(&self) -> InMemoryStoreConfig {
        InMemoryStoreConfig {
            store_file: Some(self.store_file.trim())
                .filter(|f| !f.is_empty())
                .map(PathBuf::from),
            store_interval: Duration::from_secs(self.store_interval_secs),
            restore: self.restore,
        }
    }
}
