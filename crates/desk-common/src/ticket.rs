//! Ticket domain model
//!
//! Timestamps are set by explicit transition functions rather than
//! persistence-layer hooks, so the timing behavior is visible at the call
//! site and testable with an injected clock.

use crate::{CompanyId, TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ticket lifecycle status
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// Statuses with an outstanding resolution obligation
    pub fn is_active(&self) -> bool {
        matches!(self, TicketStatus::Open | TicketStatus::InProgress)
    }
}

/// Ticket priority, indexes the SLA rule ladder
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Support ticket, restricted to the fields the core reads and writes.
///
/// `sla_breached` and `escalated` are one-way: once true they are never
/// reset. `version` is the optimistic-concurrency token checked by the
/// ticket store on every update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub company_id: CompanyId,
    pub customer_id: UserId,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    /// Absent only when hydrated from a row that predates the field;
    /// the SLA engine treats absence as a precondition violation.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub sla_response_due_at: Option<DateTime<Utc>>,
    pub sla_resolution_due_at: Option<DateTime<Utc>>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub sla_breached: bool,
    pub escalated: bool,
    pub escalated_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Ticket {
    /// Create a new open ticket with all timestamps stamped from `now`
    pub fn new(
        company_id: CompanyId,
        customer_id: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: TicketPriority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            customer_id,
            title: title.into(),
            description: description.into(),
            status: TicketStatus::Open,
            priority,
            created_at: Some(now),
            updated_at: now,
            sla_response_due_at: None,
            sla_resolution_due_at: None,
            first_response_at: None,
            resolved_at: None,
            closed_at: None,
            sla_breached: false,
            escalated: false,
            escalated_at: None,
            version: 0,
        }
    }

    /// Transition to `status`, stamping `resolved_at`/`closed_at`
    pub fn set_status(&mut self, status: TicketStatus, now: DateTime<Utc>) {
        self.status = status;
        match status {
            TicketStatus::Resolved => self.resolved_at = Some(now),
            TicketStatus::Closed => self.closed_at = Some(now),
            _ => {}
        }
        self.updated_at = now;
    }

    /// Stamp `first_response_at` if not already set; returns whether this
    /// call was the first response.
    pub fn record_first_response(&mut self, now: DateTime<Utc>) -> bool {
        if self.first_response_at.is_some() {
            return false;
        }
        self.first_response_at = Some(now);
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_new_ticket_is_open_with_created_at() {
        let t = Ticket::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "printer on fire",
            "smoke everywhere",
            TicketPriority::High,
            t0(),
        );
        assert_eq!(t.status, TicketStatus::Open);
        assert_eq!(t.created_at, Some(t0()));
        assert!(!t.sla_breached);
        assert!(!t.escalated);
        assert_eq!(t.version, 0);
    }

    #[test]
    fn test_resolve_stamps_resolved_at() {
        let mut t = Ticket::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "a",
            "b",
            TicketPriority::Low,
            t0(),
        );
        let later = t0() + chrono::Duration::hours(2);
        t.set_status(TicketStatus::Resolved, later);
        assert_eq!(t.resolved_at, Some(later));
        assert!(!t.status.is_active());
    }

    #[test]
    fn test_first_response_recorded_once() {
        let mut t = Ticket::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "a",
            "b",
            TicketPriority::Medium,
            t0(),
        );
        let first = t0() + chrono::Duration::minutes(5);
        let second = t0() + chrono::Duration::minutes(9);
        assert!(t.record_first_response(first));
        assert!(!t.record_first_response(second));
        assert_eq!(t.first_response_at, Some(first));
    }
}
