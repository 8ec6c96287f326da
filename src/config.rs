/// Store configuration

/// Key under which the whole saved-items list lives in chrome.storage.local
pub const DEFAULT_COLLECTION_KEY: &str = "savedItems";

/// How many times a commit re-reads and re-applies its mutation before giving up
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub collection_key: String,
    pub max_commit_attempts: u32,
}

impl SyncConfig {
    pub fn new() -> Self {
        SyncConfig {
            collection_key: DEFAULT_COLLECTION_KEY.to_string(),
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_collection_key(mut self, key: impl Into<String>) -> Self {
        self.collection_key = key.into();
        self
    }

    /// Values below 1 are clamped so every commit gets at least one attempt
    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
