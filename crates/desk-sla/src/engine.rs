//! SLA engine
//!
//! Computes deadlines, breach and escalation status, and remaining time
//! for a single ticket. All dependencies are injected at construction;
//! time comes through the clock so every decision is testable.

use crate::{SlaError, SlaResult, SlaRuleLookup, TicketStore};
use chrono::Duration;
use desk_common::{Clock, StoreError, Ticket};
use std::sync::Arc;
use tracing::{debug, warn};

/// Escalation fires once this fraction of the resolution window elapses
const ESCALATION_THRESHOLD: f64 = 0.8;

/// Conflict retries before giving up on persisting a flag flip
const MAX_UPDATE_ATTEMPTS: u32 = 8;

/// Deadline and escalation logic over a [`TicketStore`]
pub struct SlaEngine {
    rules: Arc<dyn SlaRuleLookup>,
    tickets: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
}

impl SlaEngine {
    pub fn new(
        rules: Arc<dyn SlaRuleLookup>,
        tickets: Arc<dyn TicketStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rules,
            tickets,
            clock,
        }
    }

    /// Set both due-by timestamps from the ticket's creation time and its
    /// company/priority rule. Deterministic given (created_at, rule);
    /// does not persist - callers save as part of the enclosing
    /// create/update.
    ///
    /// Fails fast on a missing `created_at` (precondition violation) or a
    /// missing rule (configuration error); never silently defaults.
    pub async fn calculate_deadlines(&self, ticket: &mut Ticket) -> SlaResult<()> {
        let created_at = ticket
            .created_at
            .ok_or(SlaError::MissingCreatedAt(ticket.id))?;

        let rule = self
            .rules
            .get(ticket.company_id, ticket.priority)
            .await?;

        ticket.sla_response_due_at = Some(created_at + Duration::hours(rule.response_time_hours));
        ticket.sla_resolution_due_at =
            Some(created_at + Duration::hours(rule.resolution_time_hours));

        debug!(
            ticket_id = %ticket.id,
            response_due = ?ticket.sla_response_due_at,
            resolution_due = ?ticket.sla_resolution_due_at,
            "SLA deadlines calculated"
        );
        Ok(())
    }

    /// Detect a resolution-deadline breach.
    ///
    /// Breached iff the deadline is set, now is past it, and the ticket
    /// is still active. The first detection flips the one-way
    /// `sla_breached` flag and persists it; the flag is never cleared,
    /// detection simply stops firing once the ticket leaves the active
    /// statuses.
    pub async fn check_breach(&self, ticket: &mut Ticket) -> SlaResult<bool> {
        let Some(resolution_due) = ticket.sla_resolution_due_at else {
            return Ok(false);
        };

        let now = self.clock.now();
        let breached = now > resolution_due && ticket.status.is_active();

        if breached && !ticket.sla_breached {
            ticket.sla_breached = true;
            self.persist(ticket).await?;
            warn!(ticket_id = %ticket.id, resolution_due = %resolution_due, "SLA breached");
        }

        Ok(breached)
    }

    /// Escalate once 80% of the resolution window has elapsed.
    ///
    /// No-op when already escalated, when `created_at` or the deadline is
    /// missing, or when the window is non-positive (guarded on every
    /// path). Fires at most once; subsequent calls return false.
    pub async fn check_escalation(&self, ticket: &mut Ticket) -> SlaResult<bool> {
        if ticket.escalated {
            return Ok(false);
        }
        let Some(resolution_due) = ticket.sla_resolution_due_at else {
            return Ok(false);
        };
        let Some(created_at) = ticket.created_at else {
            warn!(ticket_id = %ticket.id, "no created_at, cannot check escalation");
            return Ok(false);
        };

        let total_minutes = (resolution_due - created_at).num_minutes();
        if total_minutes <= 0 {
            warn!(ticket_id = %ticket.id, "non-positive SLA window");
            return Ok(false);
        }

        let now = self.clock.now();
        let elapsed_minutes = (now - created_at).num_minutes();
        let fraction = elapsed_minutes as f64 / total_minutes as f64;

        if fraction < ESCALATION_THRESHOLD {
            return Ok(false);
        }

        ticket.escalated = true;
        ticket.escalated_at = Some(now);
        self.persist(ticket).await?;
        warn!(ticket_id = %ticket.id, elapsed_minutes, total_minutes, "ticket escalated");
        Ok(true)
    }

    /// Whole minutes until the resolution deadline: `None` without a
    /// deadline, `0` when already past due.
    pub fn minutes_until_due(&self, ticket: &Ticket) -> Option<i64> {
        let resolution_due = ticket.sla_resolution_due_at?;
        let now = self.clock.now();
        if now > resolution_due {
            return Some(0);
        }
        Some((resolution_due - now).num_minutes())
    }

    /// Conditional update with reload-and-reapply on conflict, so a
    /// concurrent status change can never revert a one-way flag flip.
    async fn persist(&self, ticket: &mut Ticket) -> SlaResult<()> {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            match self.tickets.update(ticket).await {
                Ok(stored) => {
                    *ticket = stored;
                    return Ok(());
                }
                Err(StoreError::Conflict(_)) => {
                    let mut fresh = self.tickets.get(ticket.id).await?;
                    fresh.sla_breached |= ticket.sla_breached;
                    if ticket.escalated && !fresh.escalated {
                        fresh.escalated = true;
                        fresh.escalated_at = ticket.escalated_at;
                    }
                    *ticket = fresh;
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(SlaError::Store(StoreError::Conflict(format!(
            "ticket {}: conditional update kept losing",
            ticket.id
        ))))
    }
}
