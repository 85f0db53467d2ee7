//! OpenDesk Ticket Service
//!
//! The write-path call sites of the core: ticket creation and priority
//! changes run the SLA engine, comment-path first responses and creation
//! are guarded by admission control. Field validation, comment storage
//! and HTTP mapping stay with outer collaborators.

pub mod service;

pub use service::TicketService;

use desk_common::StoreError;
use desk_ratelimit::RateLimitError;
use desk_sla::SlaError;
use thiserror::Error;

/// Ticket service error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// Admission denied or bucket store failed
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    /// SLA configuration or precondition failure
    #[error(transparent)]
    Sla(#[from] SlaError),

    /// Ticket store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for ticket operations
pub type TicketResult<T> = Result<T, TicketError>;
