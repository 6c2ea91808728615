//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API key, database URL) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::time::Duration;

use crate::quotes::coingecko::DEFAULT_BASE_URL;
use crate::types::AssetSpec;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub ingest: IngestConfig,
    pub quotes: QuotesConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub interval_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_persist_timeout")]
    pub persist_timeout_secs: u64,
}

impl IngestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_persist_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuotesConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key_env: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_url_env: String,
    /// Used when `database_url_env` is not set.
    pub default_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Name of the single identity observations are attributed to.
    pub user: String,
    /// Tracked assets, in the order observations are written.
    pub assets: Vec<AssetSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { enabled: false, port: 3001 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ingestion cycle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.interval_secs == 0 {
            bail!("ingest.interval_secs must be greater than zero");
        }
        if self.catalog.user.trim().is_empty() {
            bail!("catalog.user must not be empty");
        }
        if self.catalog.assets.is_empty() {
            bail!("catalog.assets must list at least one asset");
        }

        let mut seen = HashSet::new();
        for asset in &self.catalog.assets {
            if asset.symbol.trim().is_empty() {
                bail!("catalog.assets contains an empty symbol");
            }
            if !seen.insert(asset.symbol.as_str()) {
                bail!("Duplicate asset symbol in catalog: {}", asset.symbol);
            }
        }
        Ok(())
    }

    /// Database URL from the configured env var, else the configured default.
    pub fn database_url(&self) -> String {
        std::env::var(&self.storage.database_url_env)
            .unwrap_or_else(|_| self.storage.default_url.clone())
    }

    /// Quote provider API key, if the env var is set and non-empty.
    pub fn quote_api_key(&self) -> Option<SecretString> {
        std::env::var(&self.quotes.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .map(SecretString::new)
    }
}
