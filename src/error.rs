use std::path::PathBuf;

/// Failures that callers (CLI, HTTP server) need to tell apart.
#[derive(Debug, thiserror::Error)]
pub enum DocgenError {
    #[error("configuration not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("malformed configuration {}: {source}", path.display())]
    MalformedConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown format: {0:?}")]
    UnknownFormat(String),

    #[error("unknown sub type: {0:?}")]
    UnknownSubType(String),

    #[error("generator finished but produced no file at {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("generation failed: {0:#}")]
    Generation(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DocgenError {
    /// Errors caused by the request itself rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DocgenError::UnknownFormat(_) | DocgenError::UnknownSubType(_))
    }
}
