// src/query/error.rs

use crate::embedder::EmbedderError;
use crate::error::{Classify, ErrorKind};
use crate::rs::RsError;
use crate::vs::VsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("relational store error: {0}")]
    Rs(#[from] RsError),

    #[error("vector store error: {0}")]
    Vs(#[from] VsError),

    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

impl Classify for QueryError {
    fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Rs(e) => e.kind(),
            QueryError::Vs(e) => e.kind(),
            QueryError::Embedder(e) => e.kind(),
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
