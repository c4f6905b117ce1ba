//! Call policies for collaborator requests: timeout and bounded retry.

use crate::error::{CollaboratorError, PricingError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// The external services the engine depends on.
///
/// Each carries a default timeout and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    /// Item prices, stock and shipping attributes.
    Catalog,
    /// Coupon definitions and usage counts.
    Coupons,
    /// Zone lookup and rate tables.
    Shipping,
    /// Order persistence.
    Orders,
}

impl Collaborator {
    /// Get the default timeout for this collaborator.
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Catalog => Duration::from_millis(200),
            Self::Coupons => Duration::from_millis(200),
            Self::Shipping => Duration::from_millis(300),
            Self::Orders => Duration::from_millis(1000),
        }
    }

    /// Get the default max retries for this collaborator.
    pub fn default_max_retries(&self) -> u32 {
        match self {
            Self::Catalog | Self::Coupons => 2,
            Self::Shipping => 1,
            // Writes are not idempotent
            Self::Orders => 0,
        }
    }

    /// Get the name of this collaborator.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Coupons => "coupons",
            Self::Shipping => "shipping",
            Self::Orders => "orders",
        }
    }
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff with base and max.
    Exponential {
        /// Initial delay.
        base: Duration,
        /// Maximum delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::Exponential { base, max } => {
                let multiplier = 2u32.saturating_pow(attempt);
                std::cmp::min(base.saturating_mul(multiplier), *max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(20),
            max: Duration::from_millis(200),
        }
    }
}

/// Timeout and retry policy for one collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Maximum number of retry attempts after the first call.
    pub max_retries: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
}

impl CallPolicy {
    /// Create a new call policy with default backoff.
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            backoff: BackoffStrategy::default(),
        }
    }

    /// Create from a collaborator's defaults.
    pub fn for_collaborator(collaborator: Collaborator) -> Self {
        Self::new(
            collaborator.default_timeout(),
            collaborator.default_max_retries(),
        )
    }

    /// Set backoff strategy.
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Check if another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Run a collaborator call under a policy.
///
/// `op` is invoked once per attempt. Timeouts and `CollaboratorError`s are
/// retried up to the policy's budget, then surface as
/// [`PricingError::CollaboratorUnavailable`]. Successful answers, including
/// "not found" answers, are returned as-is.
pub async fn call_with_policy<T, F, Fut>(
    collaborator: Collaborator,
    policy: &CallPolicy,
    mut op: F,
) -> Result<T, PricingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(policy.timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if policy.should_retry(attempt) => {
                let delay = policy.backoff.delay_for_attempt(attempt);
                warn!(
                    collaborator = collaborator.name(),
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "collaborator call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(PricingError::CollaboratorUnavailable {
                    collaborator,
                    reason: err.to_string(),
                })
            }
        }
    }
}
