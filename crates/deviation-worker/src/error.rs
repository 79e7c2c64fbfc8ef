//! Worker error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Study error: {0}")]
    Repertoire(#[from] repertoire::RepertoireError),

    #[error("Worker pool closed: {0}")]
    Pool(#[from] tokio::sync::AcquireError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn io(path: impl std::fmt::Display, source: std::io::Error) -> Self {
        WorkerError::Io {
            path: path.to_string(),
            source,
        }
    }
}
