// src/jb/error.rs

use crate::error::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JbError {
    #[error("job broker backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("job not found: {0}")]
    NotFound(i64),

    #[error("lease on job {0} has already expired or been taken by another worker")]
    LeaseExpired(i64),

    #[error("queue backpressure: {0} pending jobs at or above the high-water mark")]
    Backpressure(i64),
}

impl Classify for JbError {
    fn kind(&self) -> ErrorKind {
        match self {
            JbError::Backend(_) => ErrorKind::Transient,
            JbError::NotFound(_) => ErrorKind::NotFound,
            JbError::LeaseExpired(_) => ErrorKind::Conflict,
            JbError::Backpressure(_) => ErrorKind::Transient,
        }
    }
}

pub type JbResult<T> = Result<T, JbError>;
