// src/worker/error.rs

use crate::embedder::EmbedderError;
use crate::error::{Classify, ErrorKind};
use crate::jb::JbError;
use crate::rs::RsError;
use crate::vs::VsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("relational store error: {0}")]
    Rs(#[from] RsError),

    #[error("vector store error: {0}")]
    Vs(#[from] VsError),

    #[error("job broker error: {0}")]
    Jb(#[from] JbError),

    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("attachment fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("blocked attachment extension")]
    BlockedExtension,

    #[error("attachment exceeds max size: {got} > {max}")]
    Oversize { got: u64, max: u64 },

    #[error("unsupported attachment source type")]
    UnsupportedSourceType,

    #[error("corrupt or unreadable attachment: {0}")]
    Corrupt(String),
}

impl Classify for WorkerError {
    fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Rs(e) => e.kind(),
            WorkerError::Vs(e) => e.kind(),
            WorkerError::Jb(e) => e.kind(),
            WorkerError::Embedder(e) => e.kind(),
            WorkerError::Fetch(_) => ErrorKind::Transient,
            WorkerError::BlockedExtension
            | WorkerError::Oversize { .. }
            | WorkerError::UnsupportedSourceType
            | WorkerError::Corrupt(_) => ErrorKind::Permanent,
        }
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;
