use thiserror::Error;

// === TabError ===

/// Errors related to tab management operations.
#[derive(Debug, Error)]
pub enum TabError {
    /// Tab with the given ID was not found.
    #[error("Tab not found: {0}")]
    NotFound(String),
    /// The provided tab index is out of bounds.
    #[error("Invalid tab index: {0}")]
    InvalidIndex(usize),
}

// === SurfaceError ===

/// Errors reported by a render surface.
///
/// These never escalate past the tab that owns the surface: a dead page load
/// is logged and the session carries on.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// A navigation could not be started or failed while loading.
    #[error("Navigation failed: {0}")]
    Navigation(String),
    /// Evaluating a script inside the page failed.
    #[error("Script evaluation failed: {0}")]
    Script(String),
    /// The address handed to the surface could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// The underlying web view is gone or not yet attached.
    #[error("Render surface unavailable: {0}")]
    Unavailable(String),
}

// === StoreError ===

/// Errors from the key-value persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("Key-value database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

// === SessionError ===

/// Errors related to session save/restore.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The underlying store could not be read or written.
    #[error("Session storage error: {0}")]
    Storage(String),
    /// A stored value could not be encoded or decoded.
    #[error("Session serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Storage(err.to_string())
    }
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    Io(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    Serialization(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === ExplainError ===

/// Errors from the explanation backend.
///
/// Any non-200 status, transport failure or unreadable body collapses into
/// `Api`; callers only distinguish "could not build the request" from
/// "the backend did not answer usefully".
#[derive(Debug, Error)]
pub enum ExplainError {
    /// The configured backend URL is not a valid absolute URL.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
    /// The backend call failed or returned something unusable.
    #[error("API error: {0}")]
    Api(String),
}
