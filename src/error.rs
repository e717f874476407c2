use thiserror::Error;

/// Failure of a single TMDB request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("TMDB returned {status}: {body}")]
    BadResponse { status: u16, body: String },

    #[error("JSON parse failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The owning screen was torn down before the response arrived.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Failure reading or writing local persisted state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored favorites are not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
