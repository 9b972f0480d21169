//! Code execution on the local machine.
//!
//! Snippets run as child processes of the host through toolchains found on an
//! augmented `PATH`. Every run gets its own scratch file, a wall-clock timeout
//! and a bounded output capture.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::SandboxError;
use languages::ExecutionKind;

/// Normalized outcome of one run, serialized as the `/api/run` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    /// Stdout followed by stderr, trimmed and capped.
    pub output: String,
    pub exit_code: i32,
    /// Wall-clock milliseconds.
    pub elapsed: u64,
    pub truncated: bool,
    pub language: String,
}

/// Registry entry as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageInfo {
    pub id: String,
    pub aliases: Vec<String>,
    pub extension: String,
    pub kind: ExecutionKind,
    pub available: bool,
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute_code(
        &self,
        language: &str,
        code: &str,
    ) -> Result<ExecutionResult, SandboxError>;

    /// Languages this executor accepts.
    fn languages(&self) -> Vec<LanguageInfo> {
        Vec::new()
    }
}

pub mod languages;
pub mod output;
pub mod process;
pub mod sandbox;
pub mod scratch;
