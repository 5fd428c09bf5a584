// src/rs/error.rs

use crate::error::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RsError {
    #[error("relational store backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    #[error("cross-tenant access attempted: {0}")]
    TenantViolation(String),

    #[error("invalid record: {0}")]
    Invalid(String),
}

impl Classify for RsError {
    fn kind(&self) -> ErrorKind {
        match self {
            RsError::Backend(_) => ErrorKind::Transient,
            RsError::NotFound(_) => ErrorKind::NotFound,
            RsError::Conflict(_) => ErrorKind::Conflict,
            RsError::TenantViolation(_) => ErrorKind::TenantViolation,
            RsError::Invalid(_) => ErrorKind::Permanent,
        }
    }
}

pub type RsResult<T> = Result<T, RsError>;
