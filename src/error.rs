//! Error taxonomy for the analysis pipeline.
//!
//! Each variant marks a distinct failure stage, so callers can tell a
//! transport failure ([`Error::Gateway`]) from unusable model output
//! ([`Error::Parse`], [`Error::InvalidResponseShape`]) from a contract
//! that simply yielded nothing ([`Error::NoValidAnalysis`]).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Document text extraction failed or produced nothing.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The completion endpoint returned a non-success status or an
    /// unreadable body. Carries the raw status and body for diagnostics.
    #[error("gateway error (status {status}): {body}")]
    Gateway { status: u16, body: String },

    /// Model output contained no recoverable JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// Every chunk's output failed to parse; there is nothing to merge.
    #[error("no valid analysis could be produced from any chunk")]
    NoValidAnalysis,

    /// Input or merged output violated a structural requirement.
    #[error("validation error: {0}")]
    Validation(String),

    /// The response envelope was structurally not what the endpoint
    /// contract promises.
    #[error("invalid response shape: {0}")]
    InvalidResponseShape(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
