use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while starting or stopping a server
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while compiling or prefixing a single file
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sass error in {path}: {message}")]
    Sass { path: PathBuf, message: String },

    #[error("css error: {0}")]
    Css(String),

    #[error("invalid browser query: {0}")]
    Browsers(String),

    #[error("compile task failed: {0}")]
    Task(String),
}

/// Errors raised by a site export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("input directory {0} does not exist")]
    MissingInput(PathBuf),

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Errors raised while waiting for scaffold completion
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("scaffold server stopped before a template was chosen")]
    Abandoned,
}

/// Errors raised while loading `pingy.json`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
