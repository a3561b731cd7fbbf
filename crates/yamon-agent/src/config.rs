use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use yamon_common::env::parse_interval_secs;
use yamon_common::HashKey;

pub const DEFAULT_CONFIG_PATH: &str = "config/agent.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Server address, `host:port` or a full URL.
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    /// Shared signing key; empty or absent disables hashing.
    #[serde(default)]
    pub hash_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_report_interval_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            poll_interval_secs: default_poll_interval_secs(),
            report_interval_secs: default_report_interval_secs(),
            hash_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl AgentConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {path}"))?;
        Ok(config)
    }

    /// Resolves the effective configuration: the file named on the command
    /// line (which must exist), else the default path if present, else
    /// built-in defaults; then environment overrides; then validation.
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

    /// Applies `ADDRESS`, `REPORT_INTERVAL`, `POLL_INTERVAL`, `KEY` and
    /// `LOG_LEVEL` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(address) = lookup("ADDRESS") {
            self.address = address;
        }
        if let Some(raw) = lookup("REPORT_INTERVAL") {
            self.report_interval_secs = parse_interval_secs(&raw)
                .with_context(|| format!("Invalid REPORT_INTERVAL: {raw}"))?;
        }
        if let Some(raw) = lookup("POLL_INTERVAL") {
            self.poll_interval_secs = parse_interval_secs(&raw)
                .with_context(|| format!("Invalid POLL_INTERVAL: {raw}"))?;
        }
        if let Some(key) = lookup("KEY") {
            self.hash_key = Some(key);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.address.trim().is_empty(), "address must not be empty");
        anyhow::ensure!(self.poll_interval_secs > 0, "poll interval must be positive");
        anyhow::ensure!(self.report_interval_secs > 0, "report interval must be positive");
        anyhow::ensure!(self.request_timeout_secs > 0, "request timeout must be positive");
        Ok(())
    }

    pub fn hash_key(&self) -> Option<HashKey> {
        self.hash_key.as_deref().and_then(HashKey::new)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
