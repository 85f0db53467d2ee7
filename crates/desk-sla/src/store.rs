//! Ticket store
//!
//! Persistence seam for ticket rows. Updates are conditional on the
//! ticket's version so "read ticket, decide, write ticket" runs as an
//! atomic unit per ticket; the one-way SLA flags additionally never
//! regress even if a writer hands back a doctored copy.

use async_trait::async_trait;
use dashmap::DashMap;
use desk_common::{StoreError, StoreResult, Ticket, TicketId};

/// Durable ticket row access, restricted to what the core needs
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Fetch one ticket
    async fn get(&self, id: TicketId) -> StoreResult<Ticket>;

    /// Insert a new ticket
    async fn insert(&self, ticket: Ticket) -> StoreResult<()>;

    /// Conditional update: applies only if the stored version matches
    /// `ticket.version`, and returns the stored copy with the bumped
    /// version. `StoreError::Conflict` on mismatch.
    async fn update(&self, ticket: &Ticket) -> StoreResult<Ticket>;

    /// Tickets with an open obligation: not escalated, resolution
    /// deadline set, status neither Resolved nor Closed
    async fn find_needing_escalation(&self) -> StoreResult<Vec<Ticket>>;
}

/// In-memory ticket store for tests and single-process deployments
#[derive(Default)]
pub struct InMemoryTicketStore {
    tickets: DashMap<TicketId, Ticket>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get(&self, id: TicketId) -> StoreResult<Ticket> {
        self.tickets
            .get(&id)
            .map(|t| t.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn insert(&self, ticket: Ticket) -> StoreResult<()> {
        self.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    async fn update(&self, ticket: &Ticket) -> StoreResult<Ticket> {
        let mut row = self
            .tickets
            .get_mut(&ticket.id)
            .ok_or_else(|| StoreError::NotFound(ticket.id.to_string()))?;

        if row.version != ticket.version {
            return Err(StoreError::Conflict(format!(
                "ticket {}: stored version {} != {}",
                ticket.id, row.version, ticket.version
            )));
        }

        let mut next = ticket.clone();
        // One-way flags never regress, whatever the writer handed us
        next.sla_breached |= row.sla_breached;
        if row.escalated {
            next.escalated = true;
            next.escalated_at = next.escalated_at.or(row.escalated_at);
        }
        next.version += 1;
        *row = next.clone();
        Ok(next)
    }

    async fn find_needing_escalation(&self) -> StoreResult<Vec<Ticket>> {
        Ok(self
            .tickets
            .iter()
            .filter(|t| !t.escalated && t.sla_resolution_due_at.is_some() && t.status.is_active())
            .map(|t| t.value().clone())
            .collect())
    }
}
