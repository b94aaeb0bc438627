//!
//! gemgate proxy bridge
//! --------------------
//! This module defines the Axum-based HTTP front for the back-office: it
//! presents a single origin to clients and forwards everything under `/api`
//! to the backend API process, which it also launches at startup.
//!
//! Responsibilities:
//! - Spawning the backend process once and folding its output into our log.
//! - Verbatim relay of method, headers, body and status in both directions,
//!   minus a fixed header exclusion list.
//! - A structured 502 when the backend cannot be reached.

use std::net::SocketAddr;
use std::process::Stdio;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::error::AppError;

/// How long startup waits after spawning the backend before serving. The
/// backend is not required to be ready by then; requests that arrive too
/// early surface as per-request 502s.
const SPAWN_GRACE_MS: u64 = 1500;

/// Defensive ceiling on the outbound call; the observed contract has none.
const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Response headers never relayed back to the client. Content-length is
/// recomputed from the relayed body rather than copied.
const EXCLUDED_RESPONSE_HEADERS: [header::HeaderName; 3] =
    [header::TRANSFER_ENCODING, header::CONNECTION, header::CONTENT_LENGTH];

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub http_port: u16,
    /// Base address of the backend, e.g. `http://127.0.0.1:8000`.
    pub backend_base: String,
    /// Command line used to launch the backend; `None` skips the spawn.
    pub backend_cmd: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            http_port: 7878,
            backend_base: "http://127.0.0.1:8000".to_string(),
            backend_cmd: None,
        }
    }
}

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub backend_base: String,
}

impl AppState {
    pub fn new(backend_base: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, backend_base: backend_base.trim_end_matches('/').to_string() })
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "gemgate ok" }))
        .route("/api/{*path}", any(proxy))
        .with_state(state)
}

/// Start the bridge: launch the backend, then serve until shutdown.
pub async fn run_with_config(cfg: BridgeConfig) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "gemgate starting: http_port={}, backend_base={}, backend_cmd={:?}",
        cfg.http_port, cfg.backend_base, cfg.backend_cmd
    );

    if let Some(cmd) = cfg.backend_cmd.as_deref() {
        spawn_backend(cmd).await;
    }

    let state = AppState::new(&cfg.backend_base)?;
    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting bridge on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Launch the backend process and fold its stdout/stderr into our log, then
/// wait a fixed grace period. A failed spawn is a warning, not an error: the
/// bridge serves regardless and proxied calls report the failure per request.
async fn spawn_backend(cmd: &str) {
    let mut parts = cmd.split_whitespace();
    let Some(program) = parts.next() else {
        warn!("empty backend command, nothing to spawn");
        return;
    };
    let spawned = Command::new(program)
        .args(parts)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    match spawned {
        Ok(mut child) => {
            info!("backend process spawned: {}", cmd);
            if let Some(out) = child.stdout.take() {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(out).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        info!(target: "backend", "{}", line);
                    }
                });
            }
            if let Some(err) = child.stderr.take() {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(err).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        warn!(target: "backend", "{}", line);
                    }
                });
            }
            // No supervised restart: a crashed backend means 502s until the
            // bridge itself is restarted.
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => warn!(target: "backend", "backend exited: {}", status),
                    Err(e) => warn!(target: "backend", "backend wait failed: {}", e),
                }
            });
        }
        Err(e) => {
            warn!("could not spawn backend `{}`: {}; serving anyway, proxied calls will fail", cmd, e);
        }
    }
    tokio::time::sleep(Duration::from_millis(SPAWN_GRACE_MS)).await;
}

/// Forward one `/api/*` request to the backend and relay the response.
async fn proxy(State(state): State<AppState>, req: Request) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();
    let bytes = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            let err = AppError::user("bad_request_body".to_string(), e.to_string());
            return error_response(StatusCode::BAD_REQUEST, err);
        }
    };

    let path = uri.path().strip_prefix("/api").unwrap_or(uri.path());
    let target = match uri.query() {
        Some(q) => format!("{}{}?{}", state.backend_base, path, q),
        None => format!("{}{}", state.backend_base, path),
    };

    // Forward all inbound headers except host (the client rewrites it) and
    // content-length (recomputed from the outbound body). Authorization is
    // re-inserted explicitly so a filtering slip cannot drop it.
    let mut fwd = HeaderMap::new();
    for (name, value) in headers.iter() {
        if name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        fwd.insert(name.clone(), value.clone());
    }
    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        fwd.insert(header::AUTHORIZATION, auth.clone());
    }

    let mut rb = state.client.request(method.clone(), target.as_str()).headers(fwd);
    if method == Method::POST || method == Method::PUT || method == Method::PATCH {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if content_type.starts_with("application/json") {
            // Re-serialize parsed JSON; a body that fails to parse goes
            // through untouched and the backend gets to reject it.
            match serde_json::from_slice::<serde_json::Value>(&bytes) {
                Ok(v) => rb = rb.json(&v),
                Err(_) => rb = rb.body(bytes.to_vec()),
            }
        } else {
            // Form-url-encoded and everything else: raw passthrough.
            rb = rb.body(bytes.to_vec());
        }
    } else if !bytes.is_empty() {
        rb = rb.body(bytes.to_vec());
    }

    match rb.send().await {
        Ok(resp) => {
            let status = resp.status();
            let mut out = HeaderMap::new();
            for (name, value) in resp.headers().iter() {
                if EXCLUDED_RESPONSE_HEADERS.contains(name) {
                    continue;
                }
                out.insert(name.clone(), value.clone());
            }
            let body = resp.text().await.unwrap_or_default();
            (status, out, body).into_response()
        }
        Err(e) => {
            error!("proxy to {} failed: {}", target, e);
            let err = AppError::upstream("upstream_unreachable".to_string(), e.to_string());
            error_response(StatusCode::BAD_GATEWAY, err)
        }
    }
}

fn error_response(status: StatusCode, err: AppError) -> Response {
    (status, Json(err)).into_response()
}
