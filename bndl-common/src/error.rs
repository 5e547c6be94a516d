use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BndlError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("API Error: {0}")]
    Api(String),

    #[error("Cache Error: {0}")]
    Cache(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Usage(String),

    #[error("command was not found in your PATH: {0}")]
    CommandNotFound(String),

    #[error("Invalid Brewfile {}:{line}: {message}", path.display())]
    Brewfile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Dependency Error: {0}")]
    DependencyError(String),

    #[error("Build environment setup failed: {0}")]
    BuildEnvError(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),
}

impl From<std::io::Error> for BndlError {
    fn from(err: std::io::Error) -> Self {
        BndlError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for BndlError {
    fn from(err: reqwest::Error) -> Self {
        BndlError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for BndlError {
    fn from(err: serde_json::Error) -> Self {
        BndlError::Json(Arc::new(err))
    }
}

impl From<which::Error> for BndlError {
    fn from(err: which::Error) -> Self {
        BndlError::CommandExecError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BndlError>;
