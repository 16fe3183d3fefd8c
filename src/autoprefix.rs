//! Autoprefixer middleware for plain CSS files.
//!
//! Only `.css` requests backed by a real file in the site directory are
//! handled here. Anything else, including `.css` compiled from Sass, falls
//! through to the rest of the chain, where the compiler does its own prefixing.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::compile::{LightningPrefixer, Prefixer};
use crate::paths::{has_extension, request_path};

/// State of the autoprefix layer
#[derive(Clone)]
pub struct Autoprefixer {
    site_dir: Arc<PathBuf>,
    browsers: Arc<Vec<String>>,
    prefixer: Arc<dyn Prefixer>,
}

impl Autoprefixer {
    pub fn new(site_dir: &Path, browsers: Vec<String>) -> Self {
        Self::with_prefixer(site_dir, browsers, Arc::new(LightningPrefixer))
    }

    pub fn with_prefixer(site_dir: &Path, browsers: Vec<String>, prefixer: Arc<dyn Prefixer>) -> Self {
        Self {
            site_dir: Arc::new(site_dir.to_path_buf()),
            browsers: Arc::new(browsers),
            prefixer,
        }
    }

    pub fn browsers(&self) -> &[String] {
        &self.browsers
    }

    /// The file a request maps to, when it is vanilla CSS that exists on disk
    fn vanilla_css(&self, uri_path: &str) -> Option<PathBuf> {
        let relative = request_path(uri_path)?;
        if !has_extension(&relative, "css") {
            return None;
        }
        let file = self.site_dir.join(relative);
        file.is_file().then_some(file)
    }
}

/// Middleware prefixing vanilla `.css` files, passing everything else on
pub async fn autoprefix_css(
    State(prefixer): State<Autoprefixer>,
    request: Request,
    next: Next,
) -> Response {
    let Some(file) = prefixer.vanilla_css(request.uri().path()) else {
        return next.run(request).await;
    };

    let css = match tokio::fs::read_to_string(&file).await {
        Ok(css) => css,
        Err(e) => {
            tracing::error!(path = %file.display(), "failed to read stylesheet: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let state = prefixer.clone();
    let result =
        tokio::task::spawn_blocking(move || state.prefixer.prefix(&css, &state.browsers)).await;

    match result {
        Ok(Ok(prefixed)) => {
            tracing::debug!(path = %file.display(), "autoprefixed");
            ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], prefixed).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(path = %file.display(), "autoprefix failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
