//! Ticket service
//!
//! Explicit dependency injection throughout: stores, engine, limiter and
//! clock arrive at construction, and each guarded operation names its
//! admission policy as a plain struct at the call site.

use crate::{TicketError, TicketResult};
use desk_common::{Clock, StoreError, Ticket, TicketId, TicketPriority, TicketStatus};
use desk_ratelimit::{rate_limited, Actor, RateLimitConfig, RateLimiter};
use desk_sla::{SlaEngine, TicketStore};
use std::sync::Arc;
use tracing::info;

/// Conflict retries for read-modify-write ticket updates
const MAX_UPDATE_ATTEMPTS: u32 = 8;

/// Guarded ticket write operations
pub struct TicketService {
    tickets: Arc<dyn TicketStore>,
    sla: Arc<SlaEngine>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    create_policy: RateLimitConfig,
    comment_policy: RateLimitConfig,
}

impl TicketService {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        sla: Arc<SlaEngine>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets,
            sla,
            limiter,
            clock,
            create_policy: RateLimitConfig::new("create_ticket").with_limit(50, 3600),
            comment_policy: RateLimitConfig::new("add_comment").with_limit(10, 60),
        }
    }

    /// Override the creation admission policy
    pub fn with_create_policy(mut self, policy: RateLimitConfig) -> Self {
        self.create_policy = policy;
        self
    }

    /// Override the comment admission policy
    pub fn with_comment_policy(mut self, policy: RateLimitConfig) -> Self {
        self.comment_policy = policy;
        self
    }

    /// Create a ticket with deadlines computed up front.
    ///
    /// A missing SLA rule fails the creation; nothing is persisted.
    pub async fn create_ticket(
        &self,
        actor: &Actor,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: TicketPriority,
    ) -> TicketResult<Ticket> {
        let title = title.into();
        let description = description.into();

        rate_limited(&self.limiter, &self.create_policy, actor, async {
            let mut ticket = Ticket::new(
                actor.company_id,
                actor.user_id,
                title,
                description,
                priority,
                self.clock.now(),
            );
            self.sla.calculate_deadlines(&mut ticket).await?;
            self.tickets.insert(ticket.clone()).await?;

            info!(ticket_id = %ticket.id, priority = ?priority, "ticket created");
            Ok(ticket)
        })
        .await
    }

    /// Change priority and recompute both deadlines wholesale from the
    /// new rule; a missing rule fails the update
    pub async fn change_priority(
        &self,
        ticket_id: TicketId,
        priority: TicketPriority,
    ) -> TicketResult<Ticket> {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut ticket = self.tickets.get(ticket_id).await?;
            ticket.priority = priority;
            self.sla.calculate_deadlines(&mut ticket).await?;
            ticket.updated_at = self.clock.now();

            match self.tickets.update(&ticket).await {
                Ok(stored) => {
                    info!(ticket_id = %ticket_id, priority = ?priority, "priority changed");
                    return Ok(stored);
                }
                Err(StoreError::Conflict(_)) => continue,
                Err(other) => return Err(other.into()),
            }
        }
        Err(StoreError::Conflict(format!("ticket {ticket_id}: update kept losing")).into())
    }

    /// Explicit status transition, stamping `resolved_at`/`closed_at`
    pub async fn change_status(
        &self,
        ticket_id: TicketId,
        status: TicketStatus,
    ) -> TicketResult<Ticket> {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut ticket = self.tickets.get(ticket_id).await?;
            ticket.set_status(status, self.clock.now());

            match self.tickets.update(&ticket).await {
                Ok(stored) => {
                    info!(ticket_id = %ticket_id, status = ?status, "status changed");
                    return Ok(stored);
                }
                Err(StoreError::Conflict(_)) => continue,
                Err(other) => return Err(other.into()),
            }
        }
        Err(StoreError::Conflict(format!("ticket {ticket_id}: update kept losing")).into())
    }

    /// Comment-path hook: stamp the first response time once. The comment
    /// body itself is stored by an outer collaborator.
    pub async fn record_first_response(
        &self,
        actor: &Actor,
        ticket_id: TicketId,
    ) -> TicketResult<Ticket> {
        rate_limited(&self.limiter, &self.comment_policy, actor, async {
            for _ in 0..MAX_UPDATE_ATTEMPTS {
                let mut ticket = self.tickets.get(ticket_id).await?;
                ticket.record_first_response(self.clock.now());

                match self.tickets.update(&ticket).await {
                    Ok(stored) => return Ok(stored),
                    Err(StoreError::Conflict(_)) => continue,
                    Err(other) => return Err(TicketError::from(other)),
                }
            }
            Err(StoreError::Conflict(format!("ticket {ticket_id}: update kept losing")).into())
        })
        .await
    }

    /// Remaining minutes before the resolution deadline, for rendering
    pub async fn minutes_until_due(&self, ticket_id: TicketId) -> TicketResult<Option<i64>> {
        let ticket = self.tickets.get(ticket_id).await?;
        Ok(self.sla.minutes_until_due(&ticket))
    }
}
