//! HTTP surface of the OpenClaw code runner.
//!
//! Exposes the dashboard's `/api/run` route on top of any
//! [`CodeExecutor`], plus a language listing and a health check.

pub mod error;

pub use error::{Result, ServerError};

use axum::extract::rejection::JsonRejection;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Json as AxumJson, State};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{Json, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use openclaw_core::{CodeExecutor, ExecutionResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Body of `POST /api/run`. Both fields are optional at the JSON level so
/// that a missing field is reported like an empty one.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            enable_cors: true,
            cors_origins: None,
            max_body_size: 1024 * 1024, // 1MB
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Set allowed CORS origins. An empty list allows any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = if origins.is_empty() {
            None
        } else {
            Some(origins)
        };
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Shared application state containing the executor and configuration.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn CodeExecutor>,
    pub config: ServerConfig,
}

/// Handler for the /api/run POST endpoint.
async fn run_handler(
    State(app_state): State<AppState>,
    payload: std::result::Result<AxumJson<RunRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>> {
    let AxumJson(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(rejection.body_text())
        } else {
            ServerError::invalid_request(rejection.body_text())
        }
    })?;

    let code = request.code.unwrap_or_default();
    let language = request.language.unwrap_or_default();
    log::info!(
        "Received run request: language={:?}, {} bytes of code",
        language,
        code.len()
    );

    let result = app_state.executor.execute_code(&language, &code).await?;
    Ok(Json(result))
}

/// Handler for the /api/run/languages GET endpoint.
async fn languages_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let executor = Arc::clone(&app_state.executor);
    // Availability probing stats files on every PATH entry.
    let languages = tokio::task::spawn_blocking(move || executor.languages())
        .await
        .unwrap_or_else(|e| {
            log::error!("Language listing task failed: {}", e);
            Vec::new()
        });
    Json(json!({ "languages": languages }))
}

/// One line per request and per response, tied together by a request id.
/// Health probes log at debug so they do not drown out runs.
async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let level = if request.uri().path() == "/health" {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    log::log!(level, "[{}] {} {}", request_id, request.method(), request.uri());

    let started = std::time::Instant::now();
    let response = next.run(request).await;
    log::log!(
        level,
        "[{}] {} in {:?}",
        request_id,
        response.status(),
        started.elapsed()
    );
    response
}

/// Restricts CORS to `origins` when given. Entries that are not valid header
/// values are skipped; if none remain, any origin is allowed.
fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .unwrap_or_default()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// The code runner HTTP server.
pub struct OpenClawServer {
    executor: Arc<dyn CodeExecutor>,
    config: ServerConfig,
}

impl OpenClawServer {
    /// Create a new server with the given executor and default configuration.
    pub fn new(executor: Arc<dyn CodeExecutor>) -> Self {
        Self {
            executor,
            config: ServerConfig::default(),
        }
    }

    /// Create a new server with custom configuration.
    pub fn with_config(executor: Arc<dyn CodeExecutor>, config: ServerConfig) -> Self {
        Self { executor, config }
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            executor: Arc::clone(&self.executor),
            config: self.config.clone(),
        };

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/api/run", post(run_handler))
            .route("/api/run/languages", get(languages_handler))
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(log_requests));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(cors_layer(self.config.cors_origins.as_deref()));
        }

        router
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server will shut down when the provided shutdown signal is received.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!("OpenClaw runner listening on {}", self.config.bind_addr);
        log::info!("Health check: http://{}/health", self.config.bind_addr);
        log::info!("Run endpoint: http://{}/api/run", self.config.bind_addr);
        log::info!(
            "Languages: http://{}/api/run/languages",
            self.config.bind_addr
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("OpenClaw runner shut down gracefully");
        Ok(())
    }
}

/// Utility function to create a shutdown signal from Ctrl+C.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use openclaw_core::{ExecutionKind, LanguageInfo, SandboxConfig, SandboxError, SandboxRunner};
    use std::sync::Mutex;
    use tower::ServiceExt; // for `oneshot`

    #[derive(Default)]
    struct MockExecutor {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CodeExecutor for MockExecutor {
        async fn execute_code(
            &self,
            language: &str,
            code: &str,
        ) -> std::result::Result<ExecutionResult, SandboxError> {
            self.calls
                .lock()
                .unwrap()
                .push((language.to_string(), code.to_string()));
            if code.is_empty() {
                return Err(SandboxError::MissingSourceCode);
            }
            if language != "python" {
                return Err(SandboxError::UnsupportedLanguage {
                    language: language.to_string(),
                    supported: vec!["python".to_string()],
                });
            }
            Ok(ExecutionResult {
                success: true,
                output: "hi".to_string(),
                exit_code: 0,
                elapsed: 12,
                truncated: false,
                language: language.to_string(),
            })
        }

        fn languages(&self) -> Vec<LanguageInfo> {
            vec![LanguageInfo {
                id: "python".to_string(),
                aliases: vec!["py".to_string()],
                extension: "py".to_string(),
                kind: ExecutionKind::Interpreted,
                available: true,
            }]
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_run(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/run")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_returns_result_shape() {
        let server = OpenClawServer::new(Arc::new(MockExecutor::default()));
        let (status, body) = send(
            server.build_router(),
            post_run(r#"{"code":"print('hi')","language":"python"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["output"], "hi");
        assert_eq!(body["exitCode"], 0);
        assert_eq!(body["elapsed"], 12);
        assert_eq!(body["truncated"], false);
        assert_eq!(body["language"], "python");
    }

    #[tokio::test]
    async fn test_unsupported_language_is_400_with_error() {
        let server = OpenClawServer::new(Arc::new(MockExecutor::default()));
        let (status, body) = send(
            server.build_router(),
            post_run(r#"{"code":"x","language":"cobol"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("cobol"));
        assert!(error.contains("python"));
    }

    #[tokio::test]
    async fn test_missing_code_field_is_400() {
        let executor = Arc::new(MockExecutor::default());
        let server = OpenClawServer::new(executor.clone());
        let (status, body) = send(server.build_router(), post_run(r#"{"language":"python"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No code provided");
        assert_eq!(
            executor.calls.lock().unwrap().as_slice(),
            &[("python".to_string(), String::new())]
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let server = OpenClawServer::new(Arc::new(MockExecutor::default()));
        let (status, body) = send(server.build_router(), post_run("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let config = ServerConfig::new().with_max_body_size(64);
        let server = OpenClawServer::with_config(Arc::new(MockExecutor::default()), config);
        let code = "x".repeat(1024);
        let (status, _) = send(
            server.build_router(),
            post_run(&format!(r#"{{"code":"{}","language":"python"}}"#, code)),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_languages_endpoint() {
        let server = OpenClawServer::new(Arc::new(MockExecutor::default()));
        let (status, body) = send(
            server.build_router(),
            Request::builder()
                .uri("/api/run/languages")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["languages"][0]["id"], "python");
        assert_eq!(body["languages"][0]["kind"], "interpreted");
        assert_eq!(body["languages"][0]["available"], true);
    }

    #[tokio::test]
    async fn test_configured_cors_origin_is_echoed() {
        let config = ServerConfig::new()
            .with_cors_origins(vec!["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
        let server = OpenClawServer::with_config(Arc::new(MockExecutor::default()), config);
        let response = server
            .build_router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = OpenClawServer::new(Arc::new(MockExecutor::default()));
        let (status, body) = send(
            server.build_router(),
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_run_through_real_sandbox() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let runner = SandboxRunner::new(&SandboxConfig {
            scratch_dir: root.path().join("scratch"),
            working_dir: work,
            ..Default::default()
        })
        .unwrap();
        let server = OpenClawServer::new(Arc::new(runner));

        let (status, body) = send(
            server.build_router(),
            post_run(r#"{"code":"echo hi; exit 3","language":"Bash"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["exitCode"], 3);
        assert_eq!(body["output"], "hi");
        assert_eq!(body["language"], "bash");
        assert_eq!(
            std::fs::read_dir(root.path().join("scratch")).unwrap().count(),
            0
        );
    }
}
