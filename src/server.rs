use axum::{middleware::from_fn_with_state, Router};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    net::TcpListener,
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};
use tower_http::services::ServeDir;

use crate::{
    autoprefix::{autoprefix_css, Autoprefixer},
    config::SiteOptions,
    error::ServeError,
    handle::ServerHandle,
    inject::inject_html,
    live_reload::{self, LiveReload},
    site::SiteMiddleware,
};

/// A running site server and the collaborators wired into it
pub struct SiteServer {
    pub server: ServerHandle,
    pub url: String,
    pub pingy: Arc<SiteMiddleware>,
    pub instant: LiveReload,
}

impl SiteServer {
    /// Force-destroys the server, dropping open connections
    pub async fn destroy(self) {
        self.server.destroy().await;
    }
}

/// Starts serving `site_dir`.
///
/// The listener is bound before this returns. Must be called inside a tokio
/// runtime. The directory itself is not validated; a missing or unreadable
/// directory shows up as errors on requests that touch it.
pub fn serve_site(site_dir: impl Into<PathBuf>, options: &SiteOptions) -> Result<SiteServer, ServeError> {
    let site_dir = site_dir.into();
    let browsers = options.autoprefix.browsers();

    // Live reload for directly served assets
    let instant = match LiveReload::watch(&site_dir, options.broadcast_capacity) {
        Ok(live) => live,
        Err(e) => {
            tracing::warn!("live reload will not watch the site: {e}");
            LiveReload::new(options.broadcast_capacity)
        }
    };

    // Site middleware recompiles sources on request
    let pingy = Arc::new(SiteMiddleware::new(&site_dir, browsers.clone()));
    if let Err(e) = pingy.watch() {
        tracing::warn!("source edits will not trigger reloads: {e}");
    }

    // Build the request chain and bridge source changes to reloads
    let app = site_router(&site_dir, browsers, &pingy, &instant);
    forward_file_changes(&pingy, instant.clone());

    // Bind synchronously
    let addr = options.socket_addr();
    let listener =
        std::net::TcpListener::bind(addr).map_err(|source| ServeError::Bind { addr, source })?;
    listener.set_nonblocking(true)?;
    // Start server
    let server = ServerHandle::spawn(TcpListener::from_std(listener)?, app)?;

    let url = format!("http://localhost:{}", server.port());
    tracing::info!(dir = %site_dir.display(), %url, "serving site");

    Ok(SiteServer {
        server,
        url,
        pingy,
        instant,
    })
}

/// Builds the request chain: autoprefixer (when enabled), live reload,
/// static files, then the site middleware.
pub fn site_router(
    site_dir: &Path,
    browsers: Option<Vec<String>>,
    pingy: &Arc<SiteMiddleware>,
    instant: &LiveReload,
) -> Router {
    let static_files = ServeDir::new(site_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(pingy.service());

    let router = instant
        .routes()
        .fallback_service(static_files)
        .layer(from_fn_with_state(live_reload::CLIENT_PATH, inject_html));

    match browsers {
        Some(browsers) => router.layer(from_fn_with_state(
            Autoprefixer::new(site_dir, browsers),
            autoprefix_css,
        )),
        None => router,
    }
}

/// Pushes a reload for every `fileChanged` event of the site middleware
pub fn forward_file_changes(pingy: &SiteMiddleware, instant: LiveReload) -> JoinHandle<()> {
    let mut events = pingy.events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(path) => {
                    instant.reload(&path);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "file change events lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
