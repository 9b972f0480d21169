//! Per-run scratch files.
//!
//! A [`ScratchFile`] owns one `run_<token>.<ext>` source file and the
//! artifacts its toolchain may produce next to it. Dropping it deletes all of
//! them, whatever way the run ended.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const TOKEN_LEN: usize = 12;
const MAX_NAME_ATTEMPTS: usize = 8;

/// True when `path` can be pasted into a shell command without quoting.
pub fn is_shell_safe(path: &Path) -> bool {
    path.to_str().is_some_and(|s| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'))
    })
}

/// Lowercase hex token, unique per run.
pub fn generate_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LEN);
    token
}

pub fn file_name(token: &str, extension: &str) -> String {
    format!("run_{}.{}", token, extension)
}

#[derive(Debug)]
pub struct ScratchFile {
    token: String,
    source: PathBuf,
    artifacts: Vec<PathBuf>,
}

impl ScratchFile {
    /// Creates `dir` if needed and writes `code` verbatim to a fresh file.
    /// The name is never reused: creation fails on an existing file and a new
    /// token is drawn.
    pub async fn create(dir: &Path, extension: &str, code: &str) -> io::Result<Self> {
        if !is_shell_safe(dir) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "scratch directory '{}' contains characters that need shell quoting",
                    dir.display()
                ),
            ));
        }
        fs::create_dir_all(dir).await?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let token = generate_token();
            let source = dir.join(file_name(&token, extension));
            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&source)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };

            // The guard exists before the first byte is written so a failed
            // write still removes the file.
            let scratch = Self {
                token,
                source,
                artifacts: Vec::new(),
            };
            file.write_all(code.as_bytes()).await?;
            file.flush().await?;
            return Ok(scratch);
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not generate a unique scratch file name",
        ))
    }

    /// Registers files to delete along with the source.
    pub fn track_artifacts(&mut self, artifacts: Vec<PathBuf>) {
        self.artifacts.extend(artifacts);
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn path(&self) -> &Path {
        &self.source
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        for path in std::iter::once(&self.source).chain(self.artifacts.iter()) {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::debug!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }
}
