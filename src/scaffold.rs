//! Scaffolder: a short-lived server that lets the user pick a project template
//! in the browser, then shuts itself down.

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{
    future::Future,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::services::ServeDir;

use crate::{
    error::{ScaffoldError, ServeError},
    handle::ServerHandle,
    inject::inject_html,
};

/// Mount point of the scaffold API
pub const API_PATH: &str = "/__pingy__";

/// Path of the injected client script
pub const CLIENT_PATH: &str = "/__pingy__.js";

/// Directory under the scaffold assets holding one sub-directory per template
pub const TEMPLATES_DIR: &str = "templates";

const CLIENT_JS: &str = include_str!("assets/pingy.js");

/// Single-use completion callback handed to the scaffold API
#[derive(Clone)]
pub struct Resolver {
    tx: Arc<Mutex<Option<oneshot::Sender<Value>>>>,
}

impl Resolver {
    /// Creates a resolver and the receiver its value arrives on
    pub fn channel() -> (Self, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        let resolver = Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        (resolver, rx)
    }

    /// Completes the scaffold with `scaffold`. Only the first call has any effect.
    pub fn resolve(&self, scaffold: Value) -> bool {
        let sender = match self.tx.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(scaffold).is_ok(),
            None => false,
        }
    }
}

/// Resolves with the chosen scaffold once the scaffolder has shut down
pub struct ScaffoldComplete {
    rx: oneshot::Receiver<Value>,
}

impl Future for ScaffoldComplete {
    type Output = Result<Value, ScaffoldError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| ScaffoldError::Abandoned))
    }
}

pub struct ScaffoldServer {
    pub scaffold_url: String,
    pub scaffold_complete: ScaffoldComplete,
}

#[derive(Clone)]
struct ApiState {
    resolver: Resolver,
    scaffold_dir: Arc<PathBuf>,
}

/// Scaffold API: template listing and the completion endpoint
pub fn api(resolver: Resolver, scaffold_dir: &Path) -> Router {
    Router::new()
        .route("/templates", get(list_templates))
        .route("/complete", post(complete))
        .with_state(ApiState {
            resolver,
            scaffold_dir: Arc::new(scaffold_dir.to_path_buf()),
        })
}

async fn list_templates(State(state): State<ApiState>) -> impl IntoResponse {
    let dir = state.scaffold_dir.join(TEMPLATES_DIR);
    match template_names(&dir).await {
        Ok(templates) => Json(json!({ "templates": templates })).into_response(),
        Err(e) => {
            tracing::error!(dir = %dir.display(), "failed to list templates: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn template_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

async fn complete(State(state): State<ApiState>, Json(scaffold): Json<Value>) -> impl IntoResponse {
    if state.resolver.resolve(scaffold) {
        (StatusCode::OK, Json(json!({ "ok": true })))
    } else {
        (
            StatusCode::CONFLICT,
            Json(json!({ "ok": false, "error": "scaffold already completed" })),
        )
    }
}

async fn serve_pingy_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_JS)
}

/// Builds the scaffolder chain: template injection, static assets, API, client script
pub fn scaffold_router(scaffold_dir: &Path, resolver: Resolver) -> Router {
    let rest = Router::new()
        .nest(API_PATH, api(resolver, scaffold_dir))
        .route(CLIENT_PATH, get(serve_pingy_js));

    Router::new()
        .fallback_service(
            ServeDir::new(scaffold_dir)
                .call_fallback_on_method_not_allowed(true)
                .fallback(rest),
        )
        .layer(from_fn_with_state(CLIENT_PATH, inject_html))
}

/// Starts the scaffolder on a free local port.
///
/// The server is force-destroyed as soon as the scaffold API is resolved;
/// `scaffold_complete` then yields the submitted JSON.
pub async fn serve_scaffolder(scaffold_dir: impl Into<PathBuf>) -> Result<ScaffoldServer, ServeError> {
    let scaffold_dir = scaffold_dir.into();
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;

    let (resolver, resolved) = Resolver::channel();
    let server = ServerHandle::spawn(listener, scaffold_router(&scaffold_dir, resolver))?;
    let scaffold_url = format!("http://localhost:{}", server.port());
    tracing::info!(dir = %scaffold_dir.display(), url = %scaffold_url, "scaffolder started");

    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(async move {
        let Ok(scaffold) = resolved.await else {
            return;
        };
        server.destroy().await;
        tracing::info!("scaffold complete");
        let _ = done_tx.send(scaffold);
    });

    Ok(ScaffoldServer {
        scaffold_url,
        scaffold_complete: ScaffoldComplete { rx: done_rx },
    })
}
