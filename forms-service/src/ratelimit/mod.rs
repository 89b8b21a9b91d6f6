//! Per-client, per-form submission throttling.
//!
//! Every submission endpoint calls [`RateLimiter::check_and_record`] before
//! doing any other work. Attempts are counted in a fixed window keyed by a
//! hash of (client ip, user agent, form kind), so the same browser hammering
//! one form is throttled without affecting its other forms.

pub mod store;

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::model::FormKind;

pub use store::{CounterStore, InMemoryCounterStore, RedisCounterStore};

/// Attempt budget for one form kind.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    pub max_attempts: u64,
    pub window_seconds: u64,
}

impl FormKind {
    /// The fixed throttle policy for this form kind.
    pub const fn rate_policy(self) -> RatePolicy {
        match self {
            FormKind::Contact => RatePolicy {
                max_attempts: 5,
                window_seconds: 3600,
            },
            FormKind::Quote => RatePolicy {
                max_attempts: 3,
                window_seconds: 3600,
            },
            FormKind::General => RatePolicy {
                max_attempts: 10,
                window_seconds: 3600,
            },
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The attempt was recorded and the request may proceed.
    Allow { remaining: u64 },
    /// The attempt budget is exhausted for this window.
    Deny { retry_after_seconds: u64 },
}

/// Keyed submission throttle over a [`CounterStore`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Check the attempt budget for this client and form, recording the
    /// attempt as a side effect when allowed.
    ///
    /// Fails open when the counter store is unreachable: the attempt is
    /// allowed and a warning is logged.
    pub async fn check_and_record(
        &self,
        client_ip: &str,
        user_agent: &str,
        form_kind: FormKind,
    ) -> RateDecision {
        let policy = form_kind.rate_policy();
        let key = limit_key(client_ip, user_agent, form_kind);

        let (count, remaining_seconds) = match self.store.incr(&key, policy.window_seconds).await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(form = %form_kind, error = %e, "rate_limit_store_unavailable");
                return RateDecision::Allow {
                    remaining: policy.max_attempts,
                };
            }
        };

        if count > policy.max_attempts {
            let retry_after_seconds = remaining_seconds.max(1);
            warn!(
                ip = %client_ip,
                user_agent = %user_agent,
                form = %form_kind,
                retry_after_seconds = retry_after_seconds,
                "rate_limit_denied"
            );
            RateDecision::Deny {
                retry_after_seconds,
            }
        } else {
            RateDecision::Allow {
                remaining: policy.max_attempts - count,
            }
        }
    }
}

/// Derive the counter key for one apparent client and form.
///
/// The raw ip/user-agent pair never reaches the counter store; only the
/// digest does.
fn limit_key(client_ip: &str, user_agent: &str, form_kind: FormKind) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_ip.as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.as_bytes());
    hasher.update(b"|");
    hasher.update(form_kind.as_str().as_bytes());
    format!(
        "ratelimit:{}:{}",
        form_kind.as_str(),
        hex::encode(hasher.finalize())
    )
}
