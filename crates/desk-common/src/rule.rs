//! SLA rules
//!
//! One rule per (company, priority) pair supplies the response and
//! resolution time budgets. A missing rule is a configuration error, not
//! a default.

use crate::{CompanyId, TicketPriority};
use serde::{Deserialize, Serialize};

/// Per-company, per-priority SLA time budgets
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlaRule {
    pub company_id: CompanyId,
    pub priority: TicketPriority,
    /// Hours until a first response is due
    pub response_time_hours: i64,
    /// Hours until resolution is due
    pub resolution_time_hours: i64,
}

impl SlaRule {
    /// The standard ladder seeded for a new company:
    /// Critical 1h/4h, High 2h/8h, Medium 4h/24h, Low 8h/48h.
    pub fn defaults_for(company_id: CompanyId) -> Vec<SlaRule> {
        [
            (TicketPriority::Critical, 1, 4),
            (TicketPriority::High, 2, 8),
            (TicketPriority::Medium, 4, 24),
            (TicketPriority::Low, 8, 48),
        ]
        .into_iter()
        .map(|(priority, response, resolution)| SlaRule {
            company_id,
            priority,
            response_time_hours: response,
            resolution_time_hours: resolution,
        })
        .collect()
    }
}
