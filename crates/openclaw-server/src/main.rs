//! Command line entry point for the OpenClaw code runner.
//!
//! `serve` hosts the `/api/run` route for the dashboard. `run` executes a
//! single snippet through the same sandbox and exits with its exit code,
//! and `languages` prints the registry with toolchain availability.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use openclaw_core::config::{ConfigLoader, OpenClawConfig};
use openclaw_core::{CodeExecutor, SandboxRunner};
use openclaw_http::{shutdown_signal, OpenClawServer, ServerConfig};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_CONFIG: &str = "openclaw.yaml";

#[derive(Parser, Debug)]
#[clap(author, version, about = "OpenClaw runner - execute code snippets for the dashboard")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, help = "Path to the YAML configuration file [default: openclaw.yaml]")]
    config: Option<PathBuf>,

    #[clap(long, short, help = "Log level (overrides logging.level from the config)")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the run API (default command)
    Serve {
        #[clap(long, help = "Address to bind, e.g. 127.0.0.1:3001")]
        bind_addr: Option<String>,
    },
    /// Execute one snippet and exit with its exit code
    Run {
        #[clap(long, short)]
        language: String,

        /// Source file to run; reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// List supported languages and whether their toolchains are installed
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger before loading the config so loader messages are
    // kept; the config's level applies once it is known.
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .init();
    log::set_max_level(effective_level(cli.log_level.as_deref(), None));

    let config = load_config(cli.config.as_deref()).await?;
    log::set_max_level(effective_level(cli.log_level.as_deref(), Some(&config)));

    match cli.command {
        Some(Commands::Serve { bind_addr }) => serve(config, bind_addr).await,
        Some(Commands::Run { language, file }) => {
            let exit_code = run_once(&config, &language, file).await?;
            std::process::exit(exit_code);
        }
        Some(Commands::Languages) => list_languages(&config),
        None => {
            // Default behavior: run the server
            serve(config, None).await
        }
    }
}

/// `--log-level` wins, then `logging.level`, then info.
fn effective_level(flag: Option<&str>, config: Option<&OpenClawConfig>) -> LevelFilter {
    flag.or(config.map(|c| c.logging.level.as_str()))
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// The default path may be absent; an explicitly named file must exist.
async fn load_config(path: Option<&Path>) -> Result<OpenClawConfig> {
    let config = match path {
        Some(path) => {
            log::info!("Loading configuration from file: {}", path.display());
            ConfigLoader::from_file(path).await?
        }
        None => ConfigLoader::from_file_or_default(DEFAULT_CONFIG).await?,
    };
    Ok(config)
}

async fn serve(config: OpenClawConfig, bind_addr: Option<String>) -> Result<()> {
    let runner = SandboxRunner::new(&config.sandbox)?;
    log::info!(
        "Sandbox ready: scratch dir {}, timeout {:?}, {} languages",
        runner.scratch_dir().display(),
        runner.timeout(),
        runner.registry().len()
    );

    let bind_addr = bind_addr.unwrap_or(config.server.bind_addr);
    let server_config = ServerConfig::new()
        .with_bind_addr_str(&bind_addr)
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", bind_addr, e))?
        .with_cors(config.server.cors)
        .with_cors_origins(config.server.cors_origins)
        .with_max_body_size(config.server.max_body_size)
        .with_logging(config.server.request_logging);

    log::info!("Starting OpenClaw runner on {}...", server_config.bind_addr);

    let server = OpenClawServer::with_config(Arc::new(runner), server_config);

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}

async fn run_once(config: &OpenClawConfig, language: &str, file: Option<PathBuf>) -> Result<i32> {
    let code = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut code = String::new();
            std::io::stdin()
                .read_to_string(&mut code)
                .context("Failed to read code from stdin")?;
            code
        }
    };

    let runner = SandboxRunner::new(&config.sandbox)?;
    let result = runner.execute_code(language, &code).await?;

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    log::info!(
        "{} exited with {} in {}ms{}",
        result.language,
        result.exit_code,
        result.elapsed,
        if result.truncated { " (truncated)" } else { "" }
    );

    Ok(result.exit_code)
}

fn list_languages(config: &OpenClawConfig) -> Result<()> {
    let runner = SandboxRunner::new(&config.sandbox)?;
    for info in runner.languages() {
        let aliases = if info.aliases.is_empty() {
            String::new()
        } else {
            format!(" ({})", info.aliases.join(", "))
        };
        println!(
            "{:<12} .{:<4} {:<12} {}{}",
            info.id,
            info.extension,
            format!("{:?}", info.kind).to_lowercase(),
            if info.available { "available" } else { "missing" },
            aliases
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_flag_is_only_set_when_given() {
        let cli = Cli::try_parse_from(["openclaw"]).unwrap();
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["openclaw", "--config", DEFAULT_CONFIG]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from(DEFAULT_CONFIG)));
    }

    #[tokio::test]
    async fn test_explicit_config_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(DEFAULT_CONFIG);
        let err = load_config(Some(&missing)).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_log_level_precedence() {
        let mut config = OpenClawConfig::default();
        config.logging.level = "warn".to_string();

        assert_eq!(effective_level(None, None), LevelFilter::Info);
        assert_eq!(effective_level(None, Some(&config)), LevelFilter::Warn);
        assert_eq!(effective_level(Some("debug"), Some(&config)), LevelFilter::Debug);
        assert_eq!(effective_level(Some("loud"), Some(&config)), LevelFilter::Info);
    }
}
