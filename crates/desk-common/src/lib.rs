//! OpenDesk Common - Shared types for the support-ticket core
//!
//! This crate provides the primitives shared by the admission-control and
//! SLA engines:
//! - Ticket domain model and status/priority enums
//! - SLA rule model and the default per-priority ladder
//! - Injectable clock abstraction for deterministic time
//! - Store error taxonomy shared by all backing stores

pub mod clock;
pub mod error;
pub mod rule;
pub mod ticket;

pub use clock::*;
pub use error::*;
pub use rule::*;
pub use ticket::*;

use uuid::Uuid;

/// Ticket identifier
pub type TicketId = Uuid;

/// Company (tenant) identifier
pub type CompanyId = Uuid;

/// User identifier
pub type UserId = Uuid;
