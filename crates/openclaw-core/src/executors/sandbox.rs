//! End-to-end snippet execution.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::languages::{normalize, LanguageRegistry};
use super::output::{cap_output, merge_streams};
use super::process::{run_shell, ProcessLimits};
use super::scratch::ScratchFile;
use super::{CodeExecutor, ExecutionResult, LanguageInfo};
use crate::config::types::SandboxConfig;
use crate::errors::{OpenClawError, SandboxError};

/// Where package managers usually install compilers and interpreters.
/// Appended to the inherited `PATH`.
fn default_toolchain_dirs() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("/opt/homebrew/bin"),
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/usr/local/go/bin"),
        PathBuf::from("/opt/homebrew/opt/openjdk/bin"),
        PathBuf::from("/usr/local/opt/openjdk/bin"),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".cargo").join("bin"));
        candidates.push(home.join("go").join("bin"));
        candidates.push(home.join(".local").join("bin"));
    }
    candidates
}

/// `extra` entries, then the inherited `PATH`, then the toolchain dirs.
/// Duplicates and entries containing the separator are dropped.
pub fn toolchain_path(extra: &[PathBuf], inherited: Option<&OsStr>) -> OsString {
    let inherited: Vec<PathBuf> = inherited
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();

    let mut entries: Vec<PathBuf> = Vec::new();
    for dir in extra
        .iter()
        .cloned()
        .chain(inherited)
        .chain(default_toolchain_dirs())
    {
        if dir.as_os_str().is_empty() || entries.contains(&dir) {
            continue;
        }
        if std::env::join_paths([&dir]).is_err() {
            log::warn!("Skipping PATH entry {}", dir.display());
            continue;
        }
        entries.push(dir);
    }

    std::env::join_paths(entries).unwrap_or_default()
}

pub struct SandboxRunner {
    registry: LanguageRegistry,
    scratch_dir: PathBuf,
    working_dir: PathBuf,
    path_env: OsString,
    limits: ProcessLimits,
    max_output_chars: usize,
}

impl SandboxRunner {
    pub fn new(config: &SandboxConfig) -> Result<Self, OpenClawError> {
        config.validate()?;
        let registry = LanguageRegistry::with_allowed(&config.allowed_languages)?;
        if !config.working_dir.is_dir() {
            log::warn!(
                "Working directory {} does not exist, every run will fail to start",
                config.working_dir.display()
            );
        }

        Ok(Self {
            registry,
            scratch_dir: config.scratch_dir.clone(),
            working_dir: config.working_dir.clone(),
            path_env: toolchain_path(&config.extra_path, std::env::var_os("PATH").as_deref()),
            limits: ProcessLimits {
                timeout: Duration::from_secs(config.timeout_secs),
                max_buffer_bytes: config.max_buffer_bytes,
            },
            max_output_chars: config.max_output_chars,
        })
    }

    /// Overrides the configured timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn timeout(&self) -> Duration {
        self.limits.timeout
    }

    pub fn path_env(&self) -> &OsStr {
        &self.path_env
    }

    pub fn languages(&self) -> Vec<LanguageInfo> {
        self.registry
            .iter()
            .map(|strategy| LanguageInfo {
                id: strategy.id.to_string(),
                aliases: strategy.aliases.iter().map(|a| a.to_string()).collect(),
                extension: strategy.extension.to_string(),
                kind: strategy.kind(),
                available: strategy.is_available(&self.path_env, &self.working_dir),
            })
            .collect()
    }

    /// Validates, writes, runs and cleans up one snippet.
    ///
    /// Only a missing snippet, an unknown language or a scratch-file I/O
    /// failure return `Err`. Everything the program itself does, including
    /// failing to compile or running past the timeout, comes back as a
    /// result with `success == false`.
    pub async fn run(&self, language: &str, code: &str) -> Result<ExecutionResult, SandboxError> {
        if code.is_empty() {
            return Err(SandboxError::MissingSourceCode);
        }
        let strategy = self.registry.resolve(language)?;

        let mut scratch = ScratchFile::create(&self.scratch_dir, strategy.extension, code).await?;
        scratch.track_artifacts(strategy.artifact_paths(scratch.path()));
        let command = strategy.run_command(scratch.path());
        log::info!(
            "Running {} snippet {} ({} bytes)",
            strategy.id,
            scratch.token(),
            code.len()
        );
        log::debug!("Command for {}: {}", scratch.token(), command);

        let started = Instant::now();
        let outcome = run_shell(&command, &self.working_dir, &self.path_env, &self.limits).await;
        let elapsed = started.elapsed().as_millis() as u64;
        let token = scratch.token().to_string();
        drop(scratch);

        let exit_code = outcome.exit_code();
        let (output, capped) = cap_output(
            merge_streams(&outcome.stdout, &outcome.stderr),
            self.max_output_chars,
        );
        log::info!(
            "Snippet {} finished with exit code {} in {}ms{}",
            token,
            exit_code,
            elapsed,
            if outcome.timed_out { " (timed out)" } else { "" }
        );

        Ok(ExecutionResult {
            success: exit_code == 0,
            output,
            exit_code,
            elapsed,
            truncated: capped || outcome.overflowed,
            language: normalize(language),
        })
    }
}

#[async_trait]
impl CodeExecutor for SandboxRunner {
    async fn execute_code(
        &self,
        language: &str,
        code: &str,
    ) -> Result<ExecutionResult, SandboxError> {
        self.run(language, code).await
    }

    fn languages(&self) -> Vec<LanguageInfo> {
        SandboxRunner::languages(self)
    }
}
