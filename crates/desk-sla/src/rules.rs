//! SLA rule lookup
//!
//! External collaborator seam: rule persistence lives elsewhere, the
//! engine only needs `(company, priority) -> budgets`.

use crate::{SlaError, SlaResult};
use async_trait::async_trait;
use dashmap::DashMap;
use desk_common::{CompanyId, SlaRule, TicketPriority};

/// Read-only access to SLA rules
#[async_trait]
pub trait SlaRuleLookup: Send + Sync {
    /// Fetch the rule for a (company, priority) pair.
    /// Absence is a configuration error, not a default.
    async fn get(&self, company_id: CompanyId, priority: TicketPriority) -> SlaResult<SlaRule>;
}

/// In-memory rule table for tests and single-process deployments
#[derive(Default)]
pub struct InMemorySlaRuleLookup {
    rules: DashMap<(CompanyId, TicketPriority), SlaRule>,
}

impl InMemorySlaRuleLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one rule
    pub fn upsert(&self, rule: SlaRule) {
        self.rules.insert((rule.company_id, rule.priority), rule);
    }

    /// Seed the standard ladder for a company
    pub fn load_defaults(&self, company_id: CompanyId) {
        for rule in SlaRule::defaults_for(company_id) {
            self.upsert(rule);
        }
    }
}

#[async_trait]
impl SlaRuleLookup for InMemorySlaRuleLookup {
    async fn get(&self, company_id: CompanyId, priority: TicketPriority) -> SlaResult<SlaRule> {
        self.rules
            .get(&(company_id, priority))
            .map(|r| r.value().clone())
            .ok_or(SlaError::RuleNotFound {
                company_id,
                priority,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_defaults_loaded_per_company() {
        let lookup = InMemorySlaRuleLookup::new();
        let company = Uuid::new_v4();
        lookup.load_defaults(company);

        let rule = lookup
            .get(company, TicketPriority::Critical)
            .await
            .unwrap();
        assert_eq!(rule.response_time_hours, 1);
        assert_eq!(rule.resolution_time_hours, 4);
    }

    #[tokio::test]
    async fn test_missing_rule_is_configuration_error() {
        let lookup = InMemorySlaRuleLookup::new();
        let company = Uuid::new_v4();

        let err = lookup.get(company, TicketPriority::High).await.unwrap_err();
        assert_eq!(
            err,
            SlaError::RuleNotFound {
                company_id: company,
                priority: TicketPriority::High
            }
        );
    }
}
