use crate::core::coordinator::{
    CoordinatorConfig, DEFAULT_OFFSET, DEFAULT_PAGE, LABEL_INTERVAL, POLL_INTERVAL,
};
use crate::providers::quaiscan::DEFAULT_BASE_URL;
use anyhow::{Context, Result, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    POLL_INTERVAL.as_secs()
}

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_offset() -> u32 {
    DEFAULT_OFFSET
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Wallet address to watch.
    pub address: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_offset")]
    pub offset: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "quaiwatch", "quaiwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.address.trim().is_empty(), "Wallet address must not be empty");
        ensure!(self.poll_interval_secs > 0, "poll_interval_secs must be positive");
        ensure!(self.offset > 0, "offset must be positive");
        Ok(())
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            address: self.address.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            label_interval: LABEL_INTERVAL,
            page: self.page,
            offset: self.offset,
        }
    }
}
