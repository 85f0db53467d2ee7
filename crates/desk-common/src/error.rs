//! Error types shared across OpenDesk stores

use thiserror::Error;

/// Backing-store error, distinguishable from any admission or SLA decision.
///
/// A store failure must never be interpreted as "allowed", "denied",
/// "breached" or "escalated" - it propagates and leaves the guarded
/// operation blocked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Row not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Conditional write lost to a concurrent writer
    #[error("version conflict: {0}")]
    Conflict(String),

    /// Store unavailable or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
