//! Guard middleware
//!
//! Explicit decorator composed around a protected operation: the
//! configuration travels as a plain struct at the call site instead of
//! runtime metadata attached to a handler.

use crate::{RateLimitError, RateLimiter};
use desk_common::{CompanyId, UserId};
use std::future::Future;
use tracing::{debug, warn};

/// Admission policy for one guarded action
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Action identifier, part of the bucket key
    /// (e.g. "create_ticket", "add_comment")
    pub action: String,
    pub max_requests: u32,
    pub window_seconds: u32,
    /// Bucket per user when true, per company otherwise
    pub by_user: bool,
}

impl RateLimitConfig {
    /// Policy with the stock budget: 100 requests per hour, per user
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            max_requests: 100,
            window_seconds: 3600,
            by_user: true,
        }
    }

    pub fn with_limit(mut self, max_requests: u32, window_seconds: u32) -> Self {
        self.max_requests = max_requests;
        self.window_seconds = window_seconds;
        self
    }

    pub fn per_company(mut self) -> Self {
        self.by_user = false;
        self
    }
}

/// Authenticated caller of a guarded endpoint
#[derive(Clone, Copy, Debug)]
pub struct Actor {
    pub user_id: UserId,
    pub company_id: CompanyId,
}

impl Actor {
    /// Bucket identifier under the given scoping
    pub fn identifier(&self, by_user: bool) -> String {
        if by_user {
            format!("user_{}", self.user_id)
        } else {
            format!("company_{}", self.company_id)
        }
    }
}

/// Run `op` only if the actor passes admission control for the action.
///
/// Denial returns [`RateLimitError::Exceeded`] with the retry hint and
/// never polls `op`; a bucket-store failure surfaces as
/// [`RateLimitError::Store`], distinct from a denial.
pub async fn rate_limited<F, T, E>(
    limiter: &RateLimiter,
    config: &RateLimitConfig,
    actor: &Actor,
    op: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<RateLimitError>,
{
    let identifier = actor.identifier(config.by_user);
    let decision = limiter
        .check_and_consume(
            &identifier,
            &config.action,
            config.max_requests,
            config.window_seconds,
        )
        .await
        .map_err(|e| E::from(RateLimitError::Store(e)))?;

    if !decision.allowed {
        warn!(
            %identifier,
            action = %config.action,
            retry_after_seconds = decision.retry_after_seconds,
            "rate limit exceeded"
        );
        return Err(E::from(RateLimitError::Exceeded {
            max_requests: config.max_requests,
            window_seconds: config.window_seconds,
            retry_after_seconds: decision.retry_after_seconds,
        }));
    }

    debug!(
        %identifier,
        action = %config.action,
        tokens_remaining = decision.tokens_remaining,
        "rate limit check passed"
    );
    op.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBucketStore;
    use desk_common::ManualClock;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            Arc::new(InMemoryBucketStore::new()),
            Arc::new(ManualClock::new(chrono::Utc::now())),
        )
    }

    fn actor() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_allowed_call_runs_operation() {
        let limiter = limiter();
        let config = RateLimitConfig::new("create_ticket").with_limit(5, 60);

        let out: Result<u32, RateLimitError> =
            rate_limited(&limiter, &config, &actor(), async { Ok(42) }).await;
        assert_eq!(out.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_denied_call_never_runs_operation() {
        let limiter = limiter();
        let config = RateLimitConfig::new("create_ticket").with_limit(1, 60);
        let actor = actor();

        let ran = Arc::new(AtomicBool::new(false));

        let first: Result<(), RateLimitError> =
            rate_limited(&limiter, &config, &actor, async { Ok(()) }).await;
        assert!(first.is_ok());

        let ran_flag = ran.clone();
        let second: Result<(), RateLimitError> = rate_limited(&limiter, &config, &actor, async {
            ran_flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        match second.unwrap_err() {
            RateLimitError::Exceeded {
                max_requests,
                window_seconds,
                retry_after_seconds,
            } => {
                assert_eq!(max_requests, 1);
                assert_eq!(window_seconds, 60);
                assert_eq!(retry_after_seconds, 60);
            }
            other => panic!("expected Exceeded, got {other:?}"),
        }
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_company_scoped_bucket_shared_across_users() {
        let limiter = limiter();
        let config = RateLimitConfig::new("export").with_limit(1, 60).per_company();

        let company = Uuid::new_v4();
        let alice = Actor {
            user_id: Uuid::new_v4(),
            company_id: company,
        };
        let bob = Actor {
            user_id: Uuid::new_v4(),
            company_id: company,
        };

        let first: Result<(), RateLimitError> =
            rate_limited(&limiter, &config, &alice, async { Ok(()) }).await;
        assert!(first.is_ok());

        let second: Result<(), RateLimitError> =
            rate_limited(&limiter, &config, &bob, async { Ok(()) }).await;
        assert!(matches!(
            second.unwrap_err(),
            RateLimitError::Exceeded { .. }
        ));
    }
}
