/// Error taxonomy for the saved-items store

use thiserror::Error;

/// Errors raised while reading, writing or syncing the saved-items list.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// The storage substrate could not be reached (e.g. extension context invalidated).
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The tab query itself failed.
    #[error("Tab query failed: {0}")]
    TabQueryFailed(String),

    /// The tab query returned no tab.
    #[error("No active tab in the current window")]
    MissingActiveTab,

    /// The active tab has no usable url.
    #[error("Active tab has no url")]
    MissingTabUrl,

    /// A persisted record does not match the saved item shape.
    #[error("Stored saved items are malformed: {0}")]
    SchemaMismatch(String),

    /// The list kept changing underneath a commit.
    #[error("Saved items changed concurrently; gave up after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("Synchronizer has been torn down")]
    TornDown,
}

pub type Result<T> = std::result::Result<T, SyncError>;
