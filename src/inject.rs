//! Script injection into served HTML.
//!
//! Both the live-reload injector and the scaffold template layer add a
//! `<script>` tag to HTML responses produced further down the chain.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Inserts a script tag for `src` before the last `</body>`, or appends it.
///
/// Works on raw bytes so pages in any ASCII-compatible encoding pass through intact.
pub fn inject_script(html: &[u8], src: &str) -> Vec<u8> {
    let tag = format!("<script src=\"{src}\"></script>");
    let mut out = Vec::with_capacity(html.len() + tag.len());
    match rfind_body_close(html) {
        Some(index) => {
            out.extend_from_slice(&html[..index]);
            out.extend_from_slice(tag.as_bytes());
            out.extend_from_slice(&html[index..]);
        }
        None => {
            out.extend_from_slice(html);
            out.extend_from_slice(tag.as_bytes());
        }
    }
    out
}

fn rfind_body_close(html: &[u8]) -> Option<usize> {
    const CLOSE: &[u8] = b"</body>";
    html.windows(CLOSE.len())
        .rposition(|window| window.eq_ignore_ascii_case(CLOSE))
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

/// Middleware adding `<script src="{src}">` to successful HTML GET responses
pub async fn inject_html(State(src): State<&'static str>, request: Request, next: Next) -> Response {
    let is_get = request.method() == Method::GET;
    let response = next.run(request).await;
    if !is_get || response.status() != StatusCode::OK || !is_html(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("failed to buffer html response: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let html = inject_script(&bytes, src);
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}
