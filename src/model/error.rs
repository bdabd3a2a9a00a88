use thiserror::Error;

/// Failure modes surfaced by the TOS adapter and protocol handlers.
#[derive(Debug, Error)]
pub enum TosError {
    #[error("Invalid TOS URI format")]
    InvalidUri,

    #[error("Object {key} not found in {bucket}")]
    NotFound { bucket: String, key: String },

    #[error("{0}")]
    Service(String),

    #[error("Unsupported operation")]
    UnsupportedOperation,
}
