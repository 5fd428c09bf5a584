// src/gateway/error.rs

use crate::error::{Classify, ErrorKind};
use crate::jb::JbError;
use crate::rs::RsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("relational store error: {0}")]
    Rs(#[from] RsError),

    #[error("job broker error: {0}")]
    Jb(#[from] JbError),
}

impl Classify for IngestError {
    fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Rs(e) => e.kind(),
            IngestError::Jb(e) => e.kind(),
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
