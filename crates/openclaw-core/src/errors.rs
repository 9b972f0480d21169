//! Error types for the sandbox and its configuration.
//!
//! Only request validation and local I/O surface as errors. A program that
//! fails to compile, exits non-zero, times out or cannot be spawned is a
//! normal [`ExecutionResult`](crate::ExecutionResult) with `success == false`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("No code provided")]
    MissingSourceCode,
    #[error("Unsupported language: '{language}'. Supported languages: {}", supported.join(", "))]
    UnsupportedLanguage {
        language: String,
        supported: Vec<String>,
    },
    #[error("Scratch file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    /// True for errors caused by the request itself rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SandboxError::MissingSourceCode | SandboxError::UnsupportedLanguage { .. }
        )
    }
}

#[derive(Error, Debug, Clone)]
pub enum OpenClawError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_language_message_lists_supported_ids() {
        let err = SandboxError::UnsupportedLanguage {
            language: "cobol".to_string(),
            supported: vec!["python".to_string(), "rust".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("'cobol'"));
        assert!(message.contains("python, rust"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_io_error_is_not_a_client_error() {
        let err = SandboxError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        assert!(!err.is_client_error());
    }
}
