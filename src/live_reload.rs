//! Live reload: watches served assets and pushes reloads to connected browsers
//! over server-sent events.

use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    error::ServeError,
    paths::has_extension,
    watcher::{watch_directory, FileWatcher},
};

/// Server-sent events endpoint the client script listens on
pub const EVENTS_PATH: &str = "/__livereload/events";

/// Path of the injected client script
pub const CLIENT_PATH: &str = "/__livereload.js";

const CLIENT_JS: &str = include_str!("assets/livereload.js");

/// Files served as-is whose changes should reload the page
const SERVED_EXTENSIONS: &[&str] = &[
    "html", "htm", "css", "js", "mjs", "json", "svg", "png", "jpg", "jpeg", "gif", "webp",
    "ico", "woff", "woff2",
];

/// Live reload instance shared by the router and the site event bridge
#[derive(Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<PathBuf>,
    watcher: Option<Arc<FileWatcher>>,
}

impl LiveReload {
    /// Creates an instance that only reloads when [`LiveReload::reload`] is called
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, watcher: None }
    }

    /// Creates an instance that also reloads whenever a served asset under `dir` changes
    pub fn watch(dir: &Path, capacity: usize) -> Result<Self, ServeError> {
        let mut live = Self::new(capacity);
        let tx = live.tx.clone();
        let watcher = watch_directory(dir, is_served_asset, move |path| {
            let _ = tx.send(path);
        })?;
        live.watcher = Some(Arc::new(watcher));
        Ok(live)
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Pushes one reload to every connected client, returning how many were notified
    pub fn reload(&self, path: &Path) -> usize {
        let clients = self.tx.send(path.to_path_buf()).unwrap_or(0);
        tracing::info!(path = %path.display(), clients, "reload");
        clients
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.tx.subscribe()
    }

    /// Routes serving the event stream and the client script
    pub fn routes(&self) -> Router {
        Router::new()
            .route(EVENTS_PATH, get(sse_handler))
            .route(CLIENT_PATH, get(client_script))
            .with_state(self.clone())
    }
}

fn is_served_asset(path: &Path) -> bool {
    SERVED_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

/// SSE handler for live reload functionality
async fn sse_handler(
    State(live): State<LiveReload>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let mut rx = live.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(_) => yield Ok(Event::default().data("reload")),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "reload stream lagged");
                    yield Ok(Event::default().data("reload"));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_JS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::sleep;

    #[test]
    fn test_is_served_asset() {
        assert!(is_served_asset(Path::new("index.html")));
        assert!(is_served_asset(Path::new("css/site.CSS")));
        assert!(!is_served_asset(Path::new("notes.md")));
        assert!(!is_served_asset(Path::new("styles/main.scss")));
    }

    #[tokio::test]
    async fn test_reload_reaches_subscribers() {
        let live = LiveReload::new(16);
        let mut rx = live.subscribe();

        assert_eq!(live.reload(Path::new("index.html")), 1);
        assert_eq!(rx.recv().await.unwrap(), PathBuf::from("index.html"));
    }

    #[test]
    fn test_reload_without_clients() {
        let live = LiveReload::new(16);
        assert_eq!(live.reload(Path::new("index.html")), 0);
    }

    #[tokio::test]
    async fn test_watch_pushes_reload_for_assets() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let live = LiveReload::watch(temp_dir.path(), 16)?;
        assert!(live.is_watching());
        let mut rx = live.subscribe();

        let page = temp_dir.path().join("index.html");
        fs::write(&page, "<h1>hi</h1>")?;

        let received = tokio::select! {
            _ = sleep(Duration::from_secs(2)) => panic!("Timeout waiting for reload"),
            result = rx.recv() => result?,
        };
        assert_eq!(received.canonicalize()?, page.canonicalize()?);
        Ok(())
    }
}
