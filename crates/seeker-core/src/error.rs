use thiserror::Error;

/// Application-wide error types for Seeker.
#[derive(Error, Debug)]
pub enum AppError {
    /// The search form (query/location inputs or submit control) could not be located.
    #[error("Search input error: {0}")]
    SearchInput(String),

    /// The browsing session could not be started.
    #[error("Session init error: {0}")]
    SessionInit(String),

    /// A bounded wait for an element expired.
    #[error("Timed out after {timeout_ms}ms waiting for {locator}")]
    ElementTimeout { locator: String, timeout_ms: u64 },

    /// Any other failure talking to the browsing session.
    #[error("Browser error: {0}")]
    Browser(String),

    /// A stored snapshot's metadata could not be interpreted.
    #[error("Unreadable metadata for snapshot {snapshot}: {reason}")]
    CacheMetadata { snapshot: String, reason: String },

    /// Snapshot storage I/O failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),

    /// The caller asked for something that cannot be crawled.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AppError {
    /// Returns true if this error ends the whole crawl rather than one page or item.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, AppError::SearchInput(_) | AppError::SessionInit(_))
    }

    /// Returns true if this error is an expired element wait.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::ElementTimeout { .. })
    }
}
