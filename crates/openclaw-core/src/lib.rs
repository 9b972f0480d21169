//! Code execution sandbox for the OpenClaw UI run route.
//!
//! A snippet arrives with a declared language. The sandbox resolves the
//! language against a fixed registry of toolchain recipes, writes the snippet
//! to a uniquely named scratch file, runs it under a wall-clock timeout and an
//! output cap, removes the scratch file and any compiled artifacts, and hands
//! back a normalized result.
//!
//! # Layout
//!
//! - **Language registry**: canonical ids, aliases and build/run command templates
//! - **Scratch files**: per-run source files that delete themselves with their artifacts
//! - **Process runner**: `sh -c` child with timeout, process-group kill and capped capture
//! - **Sandbox runner**: the end-to-end pipeline, exposed through [`CodeExecutor`]
//! - **Configuration**: YAML file with environment overrides and validation

pub mod config;
pub mod errors;
pub mod executors;

pub use config::*;
pub use errors::{OpenClawError, SandboxError};
pub use executors::languages::{ExecutionKind, LanguageRegistry, LanguageStrategy, Toolchain};
pub use executors::sandbox::SandboxRunner;
pub use executors::{CodeExecutor, ExecutionResult, LanguageInfo};
