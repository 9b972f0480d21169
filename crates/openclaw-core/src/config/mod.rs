//! Configuration for the sandbox, the HTTP server and logging.
//!
//! Loaded from a YAML file, then overridden from `OPENCLAW_*` environment
//! variables, then validated.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;


use crate::errors::OpenClawError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<OpenClawConfig, OpenClawError> {
    ConfigLoader::from_file(path).await
}
