// src/vs/error.rs

use crate::error::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VsError {
    #[error("vector store backend error: {0}")]
    Backend(#[from] qdrant_client::QdrantError),

    #[error("point not found: {0}")]
    NotFound(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("vector store call attempted without a guild_id filter: {0}")]
    MissingTenantFilter(String),
}

impl Classify for VsError {
    fn kind(&self) -> ErrorKind {
        match self {
            VsError::Backend(_) => ErrorKind::Transient,
            VsError::NotFound(_) => ErrorKind::NotFound,
            VsError::DimensionMismatch { .. } => ErrorKind::Permanent,
            VsError::MissingTenantFilter(_) => ErrorKind::TenantViolation,
        }
    }
}

pub type VsResult<T> = Result<T, VsError>;
