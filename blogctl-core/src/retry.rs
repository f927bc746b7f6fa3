//! Resilient query execution.
//!
//! [`RetryExecutor`] wraps a single data-store operation and re-runs it when
//! it fails with a [`RetryClass::Transient`](crate::RetryClass) error. Between
//! attempts it sleeps with capped exponential backoff plus jitter and asks the
//! injected [`Connector`] to re-establish the connection.
//!
//! The error returned after the last attempt is the operation's own error,
//! untouched, so callers see the same shape with or without retries.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::classify::Classify;

/// Attempts made by [`RetryExecutor::execute`] unless a policy says otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_millis(3_000);
const MAX_JITTER: Duration = Duration::from_millis(200);

/// Backoff schedule for the retry executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the random delay added to each backoff.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
            max_jitter: MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Deterministic part of the delay after the failed `attempt` (0-based):
    /// `min(base * 2^attempt, max)`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Full delay after the failed `attempt`: the base delay plus jitter in
    /// `[0, max_jitter)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay_for(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max_micros = self.max_jitter.as_micros() as u64;
        if max_micros == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..max_micros))
    }
}

/// The store handle the executor may poke between attempts.
#[async_trait]
pub trait Connector: Send + Sync {
    type Error: fmt::Display + Send;

    /// Re-establish connectivity with the store. Called opportunistically;
    /// must be safe to call concurrently and repeatedly.
    async fn reconnect(&self) -> Result<(), Self::Error>;
}

/// Connector for stores that have nothing to re-establish.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

#[async_trait]
impl Connector for NoReconnect {
    type Error = Infallible;

    async fn reconnect(&self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Runs store operations, retrying transient failures.
///
/// The executor holds no state between calls; every invocation keeps its own
/// attempt counter, so one executor can be shared by all request handlers.
#[derive(Debug, Clone)]
pub struct RetryExecutor<C> {
    connector: C,
    policy: RetryPolicy,
}

impl<C: Connector> RetryExecutor<C> {
    pub fn new(connector: C) -> Self {
        Self::with_policy(connector, RetryPolicy::default())
    }

    pub fn with_policy(connector: C, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run `op` with the policy's attempt limit.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        self.execute_with_retries(self.policy.max_attempts, op).await
    }

    /// Run `op` at most `max_retries` times (at least once).
    ///
    /// Attempts are strictly sequential. A permanent error, or a transient one
    /// on the last attempt, is returned as-is.
    pub async fn execute_with_retries<T, E, F, Fut>(
        &self,
        max_retries: u32,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let max_attempts = max_retries.max(1);
        let mut attempt = 0;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() || attempt + 1 >= max_attempts {
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient store failure, retrying"
            );
            tokio::time::sleep(delay).await;
            self.best_effort_reconnect().await;
            attempt += 1;
        }
    }

    /// Reconnect failures are only logged: the retried operation is what
    /// decides whether the store is reachable again.
    async fn best_effort_reconnect(&self) {
        if let Err(err) = self.connector.reconnect().await {
            debug!(error = %err, "reconnect before retry failed");
        }
    }
}
