// src/embedder/error.rs

use crate::error::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("embedder request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedder API error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("malformed embedder response: {0}")]
    MalformedResponse(String),

    #[error("batch size {got} exceeds configured maximum {max}")]
    BatchTooLarge { got: usize, max: usize },
}

impl Classify for EmbedderError {
    fn kind(&self) -> ErrorKind {
        match self {
            EmbedderError::Request(_) => ErrorKind::Transient,
            EmbedderError::ApiError { status, .. } if *status >= 500 => ErrorKind::Transient,
            EmbedderError::ApiError { .. } => ErrorKind::Permanent,
            EmbedderError::MalformedResponse(_) => ErrorKind::Permanent,
            EmbedderError::BatchTooLarge { .. } => ErrorKind::Permanent,
        }
    }
}

pub type EmbedderResult<T> = Result<T, EmbedderError>;
