//! Protocol decode errors

use thiserror::Error;

/// A single inbound frame could not be understood
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
}
