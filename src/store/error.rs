use thiserror::Error;

/// Failures at the object store boundary
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("write key not configured (set COSMIC_WRITE_KEY)")]
    MissingWriteKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
            || matches!(self, StoreError::Api { status: 404, .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}
