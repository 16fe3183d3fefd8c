use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use crate::error::ConfigError;

/// Browser query used when autoprefixing is switched on without a query
pub const DEFAULT_BROWSERS: &str = "last 2 versions";

/// Name of the optional project configuration file inside a site directory
pub const CONFIG_FILE: &str = "pingy.json";

/// Autoprefix setting as written by the user: a flag, one browserslist query or several
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Autoprefix {
    Enabled(bool),
    Query(String),
    Queries(Vec<String>),
}

impl Default for Autoprefix {
    fn default() -> Self {
        Autoprefix::Enabled(false)
    }
}

impl Autoprefix {
    /// Normalized browser targets, or `None` when prefixing is disabled.
    ///
    /// `true` becomes `["last 2 versions"]` and a single query becomes a
    /// one-element list. Blank queries are dropped.
    pub fn browsers(&self) -> Option<Vec<String>> {
        let queries: Vec<String> = match self {
            Autoprefix::Enabled(false) => return None,
            Autoprefix::Enabled(true) => return Some(vec![DEFAULT_BROWSERS.to_string()]),
            Autoprefix::Query(query) => non_blank(std::slice::from_ref(query)),
            Autoprefix::Queries(queries) => non_blank(queries),
        };
        // Blank queries count as switched off
        (!queries.is_empty()).then_some(queries)
    }

    /// Builds the setting from repeated command line values.
    ///
    /// A bare flag (no values) means `true`.
    pub fn from_args(values: Option<Vec<String>>) -> Self {
        match values {
            None => Autoprefix::default(),
            Some(values) if values.is_empty() => Autoprefix::Enabled(true),
            Some(mut values) if values.len() == 1 => Autoprefix::Query(values.remove(0)),
            Some(values) => Autoprefix::Queries(values),
        }
    }
}

fn non_blank(queries: &[String]) -> Vec<String> {
    queries
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration for the site server
#[derive(Debug, Clone)]
pub struct SiteOptions {
    /// The port to run the server on
    pub port: u16,

    /// The IP address to bind to
    pub host: IpAddr,

    /// Vendor prefixing for plain CSS files
    pub autoprefix: Autoprefix,

    /// Whether to automatically open the browser when starting
    pub open_browser: bool,

    /// The number of reload events to buffer in the broadcast channel
    pub broadcast_capacity: usize,
}

impl SiteOptions {
    pub fn new(port: u16, autoprefix: Autoprefix) -> Self {
        Self {
            port,
            autoprefix,
            ..Self::default()
        }
    }

    /// Gets the server's socket address
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Gets the server's URL
    pub fn server_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Overlays values from `pingy.json` in the site directory, if present.
    pub fn merge_file(mut self, site_dir: &Path) -> Result<Self, ConfigError> {
        let Some(file) = ProjectFile::load(site_dir)? else {
            return Ok(self);
        };
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(autoprefix) = file.autoprefix {
            self.autoprefix = autoprefix;
        }
        Ok(self)
    }
}

impl Default for SiteOptions {
    fn default() -> Self {
        Self {
            port: 3000,
            host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            autoprefix: Autoprefix::default(),
            open_browser: true,
            broadcast_capacity: 16,
        }
    }
}

/// Contents of `pingy.json`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub port: Option<u16>,
    pub autoprefix: Option<Autoprefix>,
}

impl ProjectFile {
    pub fn load(site_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = site_dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| ConfigError::Parse { path, source })
    }
}
