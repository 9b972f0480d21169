//! Configuration loader for YAML files and environment overrides.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::types::OpenClawConfig;
use crate::errors::OpenClawError;

pub const ENV_SCRATCH_DIR: &str = "OPENCLAW_SCRATCH_DIR";
pub const ENV_BIND_ADDR: &str = "OPENCLAW_BIND_ADDR";
pub const ENV_LOG_LEVEL: &str = "OPENCLAW_LOG_LEVEL";

pub struct ConfigLoader;
impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<OpenClawConfig, OpenClawError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            OpenClawError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Like [`ConfigLoader::from_file`], but a missing file yields the
    /// defaults (still subject to environment overrides).
    pub async fn from_file_or_default<P: AsRef<Path>>(
        path: P,
    ) -> Result<OpenClawConfig, OpenClawError> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::from_file(path).await
        } else {
            log::info!(
                "No config file at {}, using defaults",
                path.display()
            );
            Self::from_str("")
        }
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<OpenClawConfig, OpenClawError> {
        Self::from_str_with_env(content, |key| std::env::var(key).ok())
    }

    /// Parses `content`, applies overrides from `lookup`, then validates.
    pub fn from_str_with_env<F>(content: &str, lookup: F) -> Result<OpenClawConfig, OpenClawError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: OpenClawConfig = if content.trim().is_empty() {
            OpenClawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                OpenClawError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Self::apply_overrides(&mut config, lookup);
        config.validate()?;

        Ok(config)
    }

    fn apply_overrides<F>(config: &mut OpenClawConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_SCRATCH_DIR).filter(|v| !v.is_empty()) {
            log::debug!("{} overrides sandbox.scratch_dir", ENV_SCRATCH_DIR);
            config.sandbox.scratch_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup(ENV_BIND_ADDR).filter(|v| !v.is_empty()) {
            log::debug!("{} overrides server.bind_addr", ENV_BIND_ADDR);
            config.server.bind_addr = addr;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            config.logging.level = level;
        }
    }
}
