use anyhow::Result;
use pingy::{serve_scaffolder, serve_site, Autoprefix, SiteOptions, SiteServer};
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::{fs, path::Path, time::Duration};
use tempfile::TempDir;
use tokio::time::timeout;

/// Helper function to create a file and its parent directories
fn create_file(root: &Path, name: &str, content: &str) -> Result<()> {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Helper function to start a site server on a free port
fn start_test_site(dir: &Path, autoprefix: Autoprefix) -> Result<(SiteServer, String)> {
    let mut options = SiteOptions::new(0, autoprefix);
    options.open_browser = false;
    let site = serve_site(dir, &options)?;
    let base_url = format!("http://127.0.0.1:{}", site.server.port());
    Ok((site, base_url))
}

fn port_of(url: &str) -> Result<u16> {
    let port = url
        .rsplit(':')
        .next()
        .ok_or_else(|| anyhow::anyhow!("no port in {url}"))?;
    Ok(port.parse()?)
}

/// Reads the event stream until a reload arrives
async fn wait_for_reload(mut events: reqwest::Response) -> Result<()> {
    let mut received = String::new();
    loop {
        let chunk = timeout(Duration::from_secs(3), events.chunk())
            .await?
            .map_err(anyhow::Error::from)?
            .ok_or_else(|| anyhow::anyhow!("event stream closed"))?;
        received.push_str(&String::from_utf8_lossy(&chunk));
        if received.contains("data: reload") {
            return Ok(());
        }
    }
}

#[tokio::test]
async fn test_serves_static_and_compiled_files() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_file(temp_dir.path(), "index.html", "<html><body>Home</body></html>")?;
    create_file(temp_dir.path(), "about.md", "# About\n\nHello, world!")?;
    create_file(temp_dir.path(), "css/main.scss", "$c: #123456; .nav { a { color: $c; } }")?;

    let (site, base_url) = start_test_site(temp_dir.path(), Autoprefix::default())?;
    let client = Client::new();

    let body = client.get(format!("{base_url}/")).send().await?.text().await?;
    assert!(body.contains("Home"));
    assert!(body.contains("<script src=\"/__livereload.js\"></script></body>"));

    let response = client.get(format!("{base_url}/about.html")).send().await?;
    assert!(response.status().is_success());
    let body = response.text().await?;
    assert!(body.contains("<h1>About</h1>"));
    assert!(body.contains("Hello, world!"));
    assert!(body.contains("/__livereload.js"));

    let response = client.get(format!("{base_url}/css/main.css")).send().await?;
    assert!(response.status().is_success());
    assert!(response.text().await?.contains(".nav a"));

    let response = client.get(format!("{base_url}/__livereload.js")).send().await?;
    assert!(response.text().await?.contains("EventSource"));

    let response = client.get(format!("{base_url}/missing.html")).send().await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    site.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_autoprefixes_vanilla_css() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_file(temp_dir.path(), "style.css", ".box { user-select: none; }")?;
    create_file(temp_dir.path(), "theme.scss", ".card { .title { user-select: none; } }")?;
    create_file(temp_dir.path(), "notes.txt", "user-select: none;")?;

    let (site, base_url) = start_test_site(temp_dir.path(), Autoprefix::Query("safari 13".into()))?;
    let client = Client::new();

    let response = client.get(format!("{base_url}/style.css")).send().await?;
    assert!(response.status().is_success());
    assert!(response.text().await?.contains("-webkit-user-select"));

    // Compiled stylesheets are prefixed by the compiler instead
    let body = client.get(format!("{base_url}/theme.css")).send().await?.text().await?;
    assert!(body.contains("-webkit-user-select"));

    let body = client.get(format!("{base_url}/notes.txt")).send().await?.text().await?;
    assert_eq!(body, "user-select: none;");

    site.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_css_untouched_without_autoprefix() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_file(temp_dir.path(), "style.css", ".box { user-select: none; }")?;

    let (site, base_url) = start_test_site(temp_dir.path(), Autoprefix::default())?;
    let body = reqwest::get(format!("{base_url}/style.css")).await?.text().await?;
    assert_eq!(body, ".box { user-select: none; }");

    site.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_css_untouched_with_blank_autoprefix_query() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_file(temp_dir.path(), "style.css", ".box { user-select: none; }")?;

    let (site, base_url) = start_test_site(temp_dir.path(), Autoprefix::Query(String::new()))?;
    let body = reqwest::get(format!("{base_url}/style.css")).await?.text().await?;
    assert_eq!(body, ".box { user-select: none; }");

    site.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_missing_site_dir_serves_errors() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let missing = temp_dir.path().join("does-not-exist");

    // Starting must succeed even though nothing can be watched or served
    let (site, base_url) = start_test_site(&missing, Autoprefix::Enabled(true))?;
    let client = Client::new();

    for path in ["/index.html", "/", "/style.css"] {
        let response = client.get(format!("{base_url}{path}")).send().await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {path}");
    }

    site.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_file_changed_event_reaches_browser() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (site, base_url) = start_test_site(temp_dir.path(), Autoprefix::default())?;

    let events = Client::new()
        .get(format!("{base_url}/__livereload/events"))
        .send()
        .await?;
    assert!(events.status().is_success());

    site.pingy.notify_changed(Path::new("index.md"));
    wait_for_reload(events).await?;

    site.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_source_edit_triggers_reload() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_file(temp_dir.path(), "page.md", "# Initial Content")?;
    let (site, base_url) = start_test_site(temp_dir.path(), Autoprefix::default())?;
    let client = Client::new();

    let events = client.get(format!("{base_url}/__livereload/events")).send().await?;
    create_file(temp_dir.path(), "page.md", "# Updated Content")?;
    wait_for_reload(events).await?;

    let body = client.get(format!("{base_url}/page.html")).send().await?.text().await?;
    assert!(body.contains("Updated Content"));

    site.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_scaffolder_completes_and_shuts_down() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_file(temp_dir.path(), "index.html", "<html><body>Pick one</body></html>")?;
    fs::create_dir_all(temp_dir.path().join("templates/blank"))?;

    let scaffold = serve_scaffolder(temp_dir.path()).await?;
    let port = port_of(&scaffold.scaffold_url)?;
    let base_url = format!("http://127.0.0.1:{port}");
    let client = Client::new();

    let body = client.get(format!("{base_url}/")).send().await?.text().await?;
    assert!(body.contains("/__pingy__.js"));

    let templates: serde_json::Value = client
        .get(format!("{base_url}/__pingy__/templates"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(templates, json!({ "templates": ["blank"] }));

    // The server is torn down without draining, so this response may be cut off
    let _ = client
        .post(format!("{base_url}/__pingy__/complete"))
        .json(&json!({ "template": "blank" }))
        .send()
        .await;

    let chosen = timeout(Duration::from_secs(5), scaffold.scaffold_complete).await??;
    assert_eq!(chosen, json!({ "template": "blank" }));
    assert!(tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_scaffolders_use_distinct_ports() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_file(temp_dir.path(), "index.html", "<body>scaffold</body>")?;

    let (first, second) = tokio::join!(
        serve_scaffolder(temp_dir.path()),
        serve_scaffolder(temp_dir.path())
    );
    let (first, second) = (first?, second?);
    assert_ne!(first.scaffold_url, second.scaffold_url);

    for url in [&first.scaffold_url, &second.scaffold_url] {
        let port = port_of(url)?;
        let response = reqwest::get(format!("http://127.0.0.1:{port}/")).await?;
        assert!(response.status().is_success());
    }
    Ok(())
}
