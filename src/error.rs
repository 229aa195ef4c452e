//! Error types for the measurement engine.

use thiserror::Error;

/// Result type alias for measurement operations.
pub type MeasureResult<T> = Result<T, MeasureError>;

/// Errors surfaced by the measurement engine.
///
/// None of these are fatal: the engine stays usable after any of them and the
/// viewer shows them as a transient notice.
#[derive(Debug, Error)]
pub enum MeasureError {
    /// Bad calibration distance, too few points, bad scale.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Nothing to export or clear.
    #[error("nothing to act on: {0}")]
    EmptyState(String),

    /// A stored value could not be decoded.
    #[error("could not read `{key}` from storage: {source}")]
    PersistenceRead {
        /// Storage key that held the corrupt value.
        key: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The key-value store rejected a read or write.
    #[error("storage unavailable: {0}")]
    Storage(String),

    /// A value could not be encoded.
    #[error("could not encode: {0}")]
    Encode(#[from] serde_json::Error),
}

impl MeasureError {
    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(details: impl Into<String>) -> Self {
        Self::InvalidInput(details.into())
    }

    /// Create an empty state error.
    #[must_use]
    pub fn empty_state(details: impl Into<String>) -> Self {
        Self::EmptyState(details.into())
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(details: impl Into<String>) -> Self {
        Self::Storage(details.into())
    }

    /// Text-table key of the notice shown for this error.
    #[must_use]
    pub const fn notice_key(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "error.invalid_input",
            Self::EmptyState(_) => "error.empty_state",
            Self::PersistenceRead { .. } => "error.persistence_read",
            Self::Storage(_) | Self::Encode(_) => "error.storage",
        }
    }
}
