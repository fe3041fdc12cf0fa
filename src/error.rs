//! Error taxonomy for indexing and search
//!
//! Transient network failures (`Http`, `NotFound`) abandon one update cycle,
//! local failures (`Io`, `Index`, `Directory`) are reported per repository,
//! `Cancelled` is an outcome rather than a failure, and configuration errors
//! (`RepositoryNotFound`, `Config`) go straight back to the caller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("cannot open index directory: {0}")]
    Directory(#[from] tantivy::directory::error::OpenDirectoryError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("pom parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("http fetch of {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("remote resource not found: {url}")]
    NotFound { url: String },

    #[error("invalid remote index: {0}")]
    InvalidRemoteIndex(String),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl IndexError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, IndexError::Cancelled)
    }

    /// Network failures that leave the existing index untouched.
    pub fn is_transient(&self) -> bool {
        matches!(self, IndexError::Http { .. } | IndexError::NotFound { .. })
    }
}
