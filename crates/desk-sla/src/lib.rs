//! OpenDesk SLA Engine
//!
//! Time-bound-obligation tracking for support tickets.
//!
//! ## Features
//! - Deadline computation from per-company, per-priority rule budgets
//! - Breach detection with a one-way `sla_breached` flag
//! - Escalation at 80% of the resolution window, fired at most once
//! - Periodic sweep with per-ticket failure isolation

pub mod engine;
pub mod rules;
pub mod store;
pub mod sweeper;

pub use engine::SlaEngine;
pub use rules::{InMemorySlaRuleLookup, SlaRuleLookup};
pub use store::{InMemoryTicketStore, TicketStore};
pub use sweeper::{EscalationSweeper, SweepReport};

use desk_common::{CompanyId, StoreError, TicketId, TicketPriority};
use thiserror::Error;

/// SLA engine error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlaError {
    /// Configuration error: every (company, priority) pair must carry a
    /// rule. Fails the enclosing ticket operation; never defaulted.
    #[error("no SLA rule for company {company_id} at priority {priority:?}")]
    RuleNotFound {
        company_id: CompanyId,
        priority: TicketPriority,
    },

    /// Precondition violation: deadlines are derived from `created_at`,
    /// which callers must assign before invoking the engine
    #[error("ticket {0} has no created_at")]
    MissingCreatedAt(TicketId),

    /// Ticket store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for SLA operations
pub type SlaResult<T> = Result<T, SlaError>;
