use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MirrorError {
    #[error("invalid accession number: {0:?}")]
    InvalidAccession(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("metadata index request failed: {0}")]
    #[diagnostic(help("the run was aborted before any dataset was processed"))]
    IndexHttp(String),

    #[error("metadata index returned status {status}: {message}")]
    #[diagnostic(help("the run was aborted before any dataset was processed"))]
    IndexStatus { status: u16, message: String },

    #[error("failed to parse metadata index: {0}")]
    #[diagnostic(help("the run was aborted before any dataset was processed"))]
    IndexParse(String),

    #[error("request failed for {url}: {message}")]
    FetchHttp { url: String, message: String },

    #[error("{url} returned status {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("download failed for {url}: {message}")]
    DownloadHttp { url: String, message: String },

    #[error("download of {url} returned status {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("unable to derive a file name from {0}")]
    Naming(String),

    #[error("state store error: {0}")]
    State(String),

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl MirrorError {
    /// Errors that mean the whole run cannot start.
    pub fn is_fatal_index(&self) -> bool {
        matches!(
            self,
            MirrorError::IndexHttp(_)
                | MirrorError::IndexStatus { .. }
                | MirrorError::IndexParse(_)
        )
    }
}
