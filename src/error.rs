/// Result type for timestamp sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error types for timestamp sync operations
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("Watcher is already running on node {0:?}")]
    AlreadyRunning(crate::dom::NodeId),

    #[error("Document is already watched (stylesheet {0:?} present)")]
    DocumentWatched(crate::dom::NodeId),

    #[error("Root node {0:?} is not part of the document")]
    DetachedRoot(crate::dom::NodeId),

    #[error("Timestamp sync is not loaded")]
    NotLoaded,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}
