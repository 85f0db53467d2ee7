//! Escalation sweeper
//!
//! Periodic batch pass re-evaluating breach and escalation state for all
//! open tickets with outstanding deadlines. Runs are serialized; a
//! trigger arriving while a sweep is in flight is skipped, not queued.

use crate::{SlaEngine, SlaResult, TicketStore};
use desk_common::StoreResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Aggregate counts from one sweep run
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    /// Candidates evaluated
    pub processed: usize,
    /// Tickets whose resolution deadline was found breached
    pub breached: usize,
    /// Tickets escalated this run
    pub escalated: usize,
    /// Per-ticket failures, logged and skipped
    pub failed: usize,
    /// True when the run was skipped because a sweep was in flight
    pub skipped: bool,
}

impl SweepReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Applies the SLA engine to every ticket with an open obligation
pub struct EscalationSweeper {
    engine: Arc<SlaEngine>,
    tickets: Arc<dyn TicketStore>,
    gate: Mutex<()>,
}

impl EscalationSweeper {
    pub fn new(engine: Arc<SlaEngine>, tickets: Arc<dyn TicketStore>) -> Self {
        Self {
            engine,
            tickets,
            gate: Mutex::new(()),
        }
    }

    /// One sweep over the current candidates.
    ///
    /// Each ticket is handled independently: a failure is logged,
    /// counted, and never aborts the batch. No ordering guarantee across
    /// tickets. Only the candidate fetch itself can fail the run.
    pub async fn run_once(&self) -> StoreResult<SweepReport> {
        let Ok(_guard) = self.gate.try_lock() else {
            debug!("sweep already in flight, skipping");
            return Ok(SweepReport::skipped());
        };

        let candidates = self.tickets.find_needing_escalation().await?;
        let mut report = SweepReport::default();

        for mut ticket in candidates {
            report.processed += 1;
            match self.check_one(&mut ticket).await {
                Ok((breached, escalated)) => {
                    if breached {
                        report.breached += 1;
                    }
                    if escalated {
                        report.escalated += 1;
                    }
                }
                Err(err) => {
                    error!(ticket_id = %ticket.id, %err, "sweep failed for ticket");
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            breached = report.breached,
            escalated = report.escalated,
            failed = report.failed,
            "escalation sweep complete"
        );
        Ok(report)
    }

    async fn check_one(&self, ticket: &mut desk_common::Ticket) -> SlaResult<(bool, bool)> {
        let breached = self.engine.check_breach(ticket).await?;
        let escalated = self.engine.check_escalation(ticket).await?;
        Ok((breached, escalated))
    }

    /// Run the sweep on a fixed interval until the handle is aborted
    pub fn spawn(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(err) = self.run_once().await {
                    error!(%err, "escalation sweep aborted by store failure");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemorySlaRuleLookup, InMemoryTicketStore, SlaEngine};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use desk_common::{
        Clock, ManualClock, StoreError, Ticket, TicketId, TicketPriority,
    };
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    /// Delegating store that fails every update for one poisoned ticket
    struct PoisonedStore {
        inner: Arc<InMemoryTicketStore>,
        poisoned: TicketId,
    }

    #[async_trait]
    impl TicketStore for PoisonedStore {
        async fn get(&self, id: TicketId) -> desk_common::StoreResult<Ticket> {
            self.inner.get(id).await
        }
        async fn insert(&self, ticket: Ticket) -> desk_common::StoreResult<()> {
            self.inner.insert(ticket).await
        }
        async fn update(&self, ticket: &Ticket) -> desk_common::StoreResult<Ticket> {
            if ticket.id == self.poisoned {
                return Err(StoreError::Unavailable("row lock timeout".into()));
            }
            self.inner.update(ticket).await
        }
        async fn find_needing_escalation(&self) -> desk_common::StoreResult<Vec<Ticket>> {
            self.inner.find_needing_escalation().await
        }
    }

    async fn seed_overdue_ticket(
        store: &InMemoryTicketStore,
        company: desk_common::CompanyId,
    ) -> Ticket {
        let mut t = Ticket::new(
            company,
            Uuid::new_v4(),
            "s",
            "d",
            TicketPriority::Critical,
            t0(),
        );
        // Critical ladder: resolution due 4h after creation
        t.sla_resolution_due_at = Some(t0() + chrono::Duration::hours(4));
        t.sla_response_due_at = Some(t0() + chrono::Duration::hours(1));
        store.insert(t.clone()).await.unwrap();
        t
    }

    fn build(
        tickets: Arc<dyn TicketStore>,
        clock: Arc<dyn Clock>,
        company: desk_common::CompanyId,
    ) -> EscalationSweeper {
        let rules = Arc::new(InMemorySlaRuleLookup::new());
        rules.load_defaults(company);
        let engine = Arc::new(SlaEngine::new(rules, tickets.clone(), clock));
        EscalationSweeper::new(engine, tickets)
    }

    #[tokio::test]
    async fn test_sweep_updates_overdue_tickets() {
        let inner = Arc::new(InMemoryTicketStore::new());
        let clock = Arc::new(ManualClock::new(t0() + chrono::Duration::hours(5)));
        let company = Uuid::new_v4();

        let a = seed_overdue_ticket(&inner, company).await;
        let b = seed_overdue_ticket(&inner, company).await;

        let sweeper = build(inner.clone(), clock, company);
        let report = sweeper.run_once().await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.breached, 2);
        assert_eq!(report.escalated, 2);
        assert_eq!(report.failed, 0);
        assert!(!report.skipped);

        for id in [a.id, b.id] {
            let stored = inner.get(id).await.unwrap();
            assert!(stored.sla_breached);
            assert!(stored.escalated);
        }
    }

    #[tokio::test]
    async fn test_one_bad_ticket_does_not_block_the_batch() {
        let inner = Arc::new(InMemoryTicketStore::new());
        let clock = Arc::new(ManualClock::new(t0() + chrono::Duration::hours(5)));
        let company = Uuid::new_v4();

        let good_a = seed_overdue_ticket(&inner, company).await;
        let bad = seed_overdue_ticket(&inner, company).await;
        let good_b = seed_overdue_ticket(&inner, company).await;

        let store = Arc::new(PoisonedStore {
            inner: inner.clone(),
            poisoned: bad.id,
        });
        let sweeper = build(store, clock, company);
        let report = sweeper.run_once().await.unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.breached, 2);
        assert_eq!(report.escalated, 2);

        for id in [good_a.id, good_b.id] {
            let stored = inner.get(id).await.unwrap();
            assert!(stored.sla_breached);
            assert!(stored.escalated);
        }
        let poisoned = inner.get(bad.id).await.unwrap();
        assert!(!poisoned.sla_breached);
        assert!(!poisoned.escalated);
    }

    /// Store whose candidate fetch stalls until released, to hold a sweep
    /// in flight
    struct StallingStore {
        inner: Arc<InMemoryTicketStore>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl TicketStore for StallingStore {
        async fn get(&self, id: TicketId) -> desk_common::StoreResult<Ticket> {
            self.inner.get(id).await
        }
        async fn insert(&self, ticket: Ticket) -> desk_common::StoreResult<()> {
            self.inner.insert(ticket).await
        }
        async fn update(&self, ticket: &Ticket) -> desk_common::StoreResult<Ticket> {
            self.inner.update(ticket).await
        }
        async fn find_needing_escalation(&self) -> desk_common::StoreResult<Vec<Ticket>> {
            self.release.notified().await;
            self.inner.find_needing_escalation().await
        }
    }

    #[tokio::test]
    async fn test_overlapping_runs_are_skipped() {
        let inner = Arc::new(InMemoryTicketStore::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let store = Arc::new(StallingStore {
            inner,
            release: release.clone(),
        });
        let clock = Arc::new(ManualClock::new(t0()));
        let sweeper = Arc::new(build(store, clock, Uuid::new_v4()));

        let first = {
            let sweeper = sweeper.clone();
            tokio::spawn(async move { sweeper.run_once().await })
        };

        // Let the first run reach the stalled fetch
        tokio::task::yield_now().await;

        let second = sweeper.run_once().await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.processed, 0);

        release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(!first.skipped);
    }
}
