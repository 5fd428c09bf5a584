// src/error.rs
// Shared error taxonomy (§7). Every component-level error type implements
// `Classify` so the Indexing Worker can decide ack/nack/dead-letter without
// matching on each component's concrete error enum.

use std::fmt;

/// The five error kinds from §7, in the order their handling policy escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, 5xx, timeout, broker unavailable. Retry with backoff.
    Transient,
    /// Schema violation, dimension mismatch, malformed payload, blocked
    /// attachment, oversize. Dead-letter immediately.
    Permanent,
    /// Referenced record was deleted between enqueue and execute. No-op success.
    NotFound,
    /// CAS failure on `mark_indexed`/`clear_vector_key`. Re-read and reconcile.
    Conflict,
    /// Attempted a VS call without a `guild_id` filter, or a cross-tenant read.
    /// Fail closed, log, alert; never returned to callers as recoverable.
    TenantViolation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TenantViolation => "tenant_violation",
        };
        write!(f, "{s}")
    }
}

/// Implemented by every component error enum so the worker's ack/nack
/// decision (§4.7) is generic across RS, VS, JB, and Embedder failures.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl ErrorKind {
    /// Whether a job that failed with this error kind should be retried
    /// by the broker rather than dead-lettered or no-op acked.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::Conflict)
    }
}
