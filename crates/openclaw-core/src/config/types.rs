//! Configuration type definitions.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working setup with the stock ceilings: 30 second timeout, 10,000 output
//! characters and a 1 MiB capture buffer per stream.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::errors::OpenClawError;
use crate::executors::scratch::is_shell_safe;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenClawConfig {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Where snippets run. Never the scratch directory.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,
    /// Searched before the inherited `PATH`.
    #[serde(default)]
    pub extra_path: Vec<PathBuf>,
    /// Canonical language ids to expose; empty exposes all.
    #[serde(default)]
    pub allowed_languages: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            working_dir: default_working_dir(),
            timeout_secs: default_timeout_secs(),
            max_output_chars: default_max_output_chars(),
            max_buffer_bytes: default_max_buffer_bytes(),
            extra_path: Vec::new(),
            allowed_languages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_true")]
    pub cors: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    #[serde(default = "default_true")]
    pub request_logging: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors: true,
            cors_origins: Vec::new(),
            max_body_size: default_max_body_size(),
            request_logging: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("openclaw-run")
}

fn default_working_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(std::env::temp_dir)
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_output_chars() -> usize {
    10_000
}

fn default_max_buffer_bytes() -> usize {
    1024 * 1024
}

fn default_bind_addr() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl SandboxConfig {
    pub fn validate(&self) -> Result<(), OpenClawError> {
        if self.timeout_secs == 0 {
            return Err(OpenClawError::ConfigError(
                "sandbox.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.max_output_chars == 0 {
            return Err(OpenClawError::ConfigError(
                "sandbox.max_output_chars must be greater than 0".to_string(),
            ));
        }

        if self.max_buffer_bytes == 0 {
            return Err(OpenClawError::ConfigError(
                "sandbox.max_buffer_bytes must be greater than 0".to_string(),
            ));
        }

        if !self.scratch_dir.is_absolute() {
            return Err(OpenClawError::ConfigError(format!(
                "sandbox.scratch_dir must be absolute: {}",
                self.scratch_dir.display()
            )));
        }

        // Generated paths are pasted into shell commands unquoted.
        if !is_shell_safe(&self.scratch_dir) {
            return Err(OpenClawError::ConfigError(format!(
                "sandbox.scratch_dir may only contain letters, digits and '/._-': {}",
                self.scratch_dir.display()
            )));
        }

        if !self.working_dir.is_absolute() {
            return Err(OpenClawError::ConfigError(format!(
                "sandbox.working_dir must be absolute: {}",
                self.working_dir.display()
            )));
        }

        if same_dir(&self.scratch_dir, &self.working_dir) {
            return Err(OpenClawError::ConfigError(
                "sandbox.working_dir must differ from sandbox.scratch_dir".to_string(),
            ));
        }

        Ok(())
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.components().eq(b.components()),
    }
}

impl OpenClawConfig {
    pub fn validate(&self) -> Result<(), OpenClawError> {
        self.sandbox.validate()?;

        self.server.bind_addr.parse::<SocketAddr>().map_err(|e| {
            OpenClawError::ConfigError(format!(
                "Invalid server.bind_addr '{}': {}",
                self.server.bind_addr, e
            ))
        })?;

        if self.server.max_body_size == 0 {
            return Err(OpenClawError::ConfigError(
                "server.max_body_size must be greater than 0".to_string(),
            ));
        }

        self.logging.level.parse::<log::LevelFilter>().map_err(|_| {
            OpenClawError::ConfigError(format!(
                "Invalid logging.level '{}'",
                self.logging.level
            ))
        })?;

        Ok(())
    }
}
