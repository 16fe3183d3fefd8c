//! Site middleware: compiles source files when their output is requested and
//! reports source changes as `fileChanged` events.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, MethodRouter},
};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::sync::broadcast;

use crate::{
    compile::{compile_file, default_compilers, source_extensions, Compiler},
    error::{CompileError, ServeError},
    paths::{has_extension, request_path},
    watcher::{watch_directory, FileWatcher},
};

const EVENT_CAPACITY: usize = 64;

/// A compiled response body and its content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub body: String,
    pub content_type: &'static str,
}

pub struct SiteMiddleware {
    site_dir: PathBuf,
    compilers: Vec<Arc<dyn Compiler>>,
    events: broadcast::Sender<PathBuf>,
    watcher: Mutex<Option<FileWatcher>>,
}

impl SiteMiddleware {
    /// Creates the middleware with the default compilers; `browsers` enables prefixing of compiled CSS
    pub fn new(site_dir: &Path, browsers: Option<Vec<String>>) -> Self {
        Self::with_compilers(site_dir, default_compilers(browsers))
    }

    pub fn with_compilers(site_dir: &Path, compilers: Vec<Arc<dyn Compiler>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            site_dir: site_dir.to_path_buf(),
            compilers,
            events,
            watcher: Mutex::new(None),
        }
    }

    pub fn site_dir(&self) -> &Path {
        &self.site_dir
    }

    /// Starts emitting `fileChanged` events for source files under the site directory
    pub fn watch(&self) -> Result<(), ServeError> {
        let extensions = source_extensions(&self.compilers);
        let events = self.events.clone();
        let watcher = watch_directory(
            &self.site_dir,
            move |path| extensions.iter().any(|ext| has_extension(path, ext)),
            move |path| {
                let _ = events.send(path);
            },
        )?;
        if let Ok(mut slot) = self.watcher.lock() {
            *slot = Some(watcher);
        }
        Ok(())
    }

    /// Subscribes to `fileChanged` events
    pub fn events(&self) -> broadcast::Receiver<PathBuf> {
        self.events.subscribe()
    }

    /// Emits one `fileChanged` event, returning the number of listeners
    pub fn notify_changed(&self, path: &Path) -> usize {
        self.events.send(path.to_path_buf()).unwrap_or(0)
    }

    /// Finds the compiler and source file that produce the requested path.
    ///
    /// `/a/b.html` is looked up as `a/b.md`, directories as `index.*` and
    /// extensionless paths as `.html`.
    pub fn find_source(&self, uri_path: &str) -> Option<(Arc<dyn Compiler>, PathBuf)> {
        let mut relative = request_path(uri_path)?;
        if uri_path.ends_with('/') || relative.as_os_str().is_empty() {
            relative.push("index.html");
        } else if relative.extension().is_none() {
            relative.set_extension("html");
        }

        for compiler in &self.compilers {
            if !has_extension(&relative, compiler.output_extension()) {
                continue;
            }
            for ext in compiler.source_extensions() {
                let source = self.site_dir.join(relative.with_extension(ext));
                if source.is_file() {
                    return Some((Arc::clone(compiler), source));
                }
            }
        }
        None
    }

    /// Compiles the source behind `uri_path`; `Ok(None)` when nothing produces it
    pub async fn compile_request(&self, uri_path: &str) -> Result<Option<Compiled>, CompileError> {
        let Some((compiler, source)) = self.find_source(uri_path) else {
            return Ok(None);
        };

        let content_type = compiler.content_type();
        let body = tokio::task::spawn_blocking(move || compile_file(compiler.as_ref(), &source))
            .await
            .map_err(|e| CompileError::Task(e.to_string()))??;

        Ok(Some(Compiled { body, content_type }))
    }

    /// Service handing requests to this middleware, used at the end of the chain
    pub fn service(self: &Arc<Self>) -> MethodRouter {
        any(handle_request).with_state(Arc::clone(self))
    }
}

async fn handle_request(State(site): State<Arc<SiteMiddleware>>, uri: Uri) -> Response {
    let path = uri.path();
    match site.compile_request(path).await {
        Ok(Some(compiled)) => {
            ([(header::CONTENT_TYPE, compiled.content_type)], compiled.body).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
        Err(e) => {
            tracing::error!(path, "compile failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn site_with(files: &[(&str, &str)]) -> anyhow::Result<(TempDir, SiteMiddleware)> {
        let temp_dir = TempDir::new()?;
        for (name, content) in files {
            let path = temp_dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
        }
        let site = SiteMiddleware::new(temp_dir.path(), None);
        Ok((temp_dir, site))
    }

    #[test]
    fn test_find_source() -> anyhow::Result<()> {
        let (_dir, site) = site_with(&[
            ("index.md", "# Home"),
            ("docs/intro.markdown", "# Intro"),
            ("css/main.scss", "a { b: c }"),
        ])?;

        let name = |uri: &str| {
            site.find_source(uri)
                .map(|(c, p)| (c.name(), p.file_name().unwrap().to_string_lossy().to_string()))
        };
        assert_eq!(name("/"), Some(("markdown", "index.md".into())));
        assert_eq!(name("/index.html"), Some(("markdown", "index.md".into())));
        assert_eq!(name("/docs/intro"), Some(("markdown", "intro.markdown".into())));
        assert_eq!(name("/css/main.css"), Some(("sass", "main.scss".into())));
        assert_eq!(name("/css/other.css"), None);
        assert_eq!(name("/../index.html"), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_compile_request() -> anyhow::Result<()> {
        let (_dir, site) = site_with(&[("about.md", "# About")])?;

        let compiled = site.compile_request("/about.html").await?.unwrap();
        assert!(compiled.body.contains("<h1>About</h1>"));
        assert!(compiled.content_type.starts_with("text/html"));
        assert!(site.compile_request("/missing.html").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_service_responses() -> anyhow::Result<()> {
        let (_dir, site) = site_with(&[("broken.scss", ".a { color: ")])?;
        let service = Arc::new(site).service();

        let response = service
            .clone()
            .oneshot(http::Request::get("/missing.html").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = service
            .oneshot(http::Request::get("/broken.css").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[tokio::test]
    async fn test_notify_changed_emits_event() -> anyhow::Result<()> {
        let (_dir, site) = site_with(&[])?;
        let mut events = site.events();

        assert_eq!(site.notify_changed(Path::new("index.md")), 1);
        assert_eq!(events.recv().await?, PathBuf::from("index.md"));
        Ok(())
    }

    #[tokio::test]
    async fn test_watch_emits_for_sources_only() -> anyhow::Result<()> {
        let (dir, site) = site_with(&[])?;
        site.watch()?;
        let mut events = site.events();

        fs::write(dir.path().join("plain.html"), "<p></p>")?;
        let source = dir.path().join("page.md");
        fs::write(&source, "# Page")?;

        let received = tokio::time::timeout(Duration::from_secs(2), events.recv()).await??;
        assert_eq!(received.canonicalize()?, source.canonicalize()?);
        Ok(())
    }
}
