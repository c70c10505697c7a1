use std::{fmt, future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::Instant;
use tracing::warn;

use crate::error::RemoteFetchError;

const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Decides whether a failed attempt may be retried.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for RemoteFetchError {
    fn is_retryable(&self) -> bool {
        match self.status {
            None => true,
            Some(status) => status >= 500 || status == 408 || status == 429,
        }
    }
}

tokio::task_local! {
    static CALL_DEADLINE: Instant;
}

fn ambient_deadline() -> Option<Instant> {
    CALL_DEADLINE.try_with(|deadline| *deadline).ok()
}

/// Runs `fut` with an ambient deadline. Every retry envelope awaited inside
/// it starts no attempt past `deadline`. Nested scopes keep the earlier one.
pub async fn with_call_deadline<F: Future>(deadline: Instant, fut: F) -> F::Output {
    let deadline = ambient_deadline().map_or(deadline, |outer| outer.min(deadline));
    CALL_DEADLINE.scope(deadline, fut).await
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryPolicyError {
    #[error("min_delay ({min:?}) must not exceed max_delay ({max:?})")]
    InvalidDelays { min: Duration, max: Duration },
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
}

/// Passed to the after hook once per failed attempt that is going to be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptInfo {
    /// 1-based number of the attempt that failed.
    pub attempt: u32,
    /// How long the policy waited before calling the hook.
    pub delay: Duration,
    pub error: String,
}

pub type AfterHook = Arc<dyn Fn(&AttemptInfo) + Send + Sync>;

/// Exponential back-off envelope around one remote call.
///
/// Attempt `k` (zero based) that fails with a retryable error is followed by
/// a wait of `min(max_delay, min_delay * 2^k)`.
#[derive(Clone)]
pub struct RetryPolicy {
    min_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    after_hook: Option<AfterHook>,
    timeout: Option<Duration>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("min_delay", &self.min_delay)
            .field("max_delay", &self.max_delay)
            .field("max_attempts", &self.max_attempts)
            .field("after_hook", &self.after_hook.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            after_hook: None,
            timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        min_delay: Duration,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Result<Self, RetryPolicyError> {
        if min_delay > max_delay {
            return Err(RetryPolicyError::InvalidDelays {
                min: min_delay,
                max: max_delay,
            });
        }
        if max_attempts == 0 {
            return Err(RetryPolicyError::ZeroAttempts);
        }
        Ok(Self {
            min_delay,
            max_delay,
            max_attempts,
            after_hook: None,
            timeout: None,
        })
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: 1,
            after_hook: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_after_hook(mut self, hook: impl Fn(&AttemptInfo) + Send + Sync + 'static) -> Self {
        self.after_hook = Some(Arc::new(hook));
        self
    }

    /// Bounds every [`RetryPolicy::retrying`] call to `timeout`, measured
    /// from the moment the call starts.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait applied after the zero-based attempt `index` failed.
    #[must_use]
    pub fn delay_for(&self, index: u32) -> Duration {
        2u32.checked_pow(index)
            .and_then(|factor| self.min_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, runs out
    /// of attempts or hits the deadline. The closure receives the 1-based
    /// attempt number. The last error is returned unchanged.
    ///
    /// The deadline is the earlier of the policy timeout, counted from now,
    /// and the ambient deadline set with [`with_call_deadline`].
    pub async fn retrying<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        self.retrying_until(None, op).await
    }

    /// [`RetryPolicy::retrying`] with an extra deadline for this call only.
    pub async fn retrying_until<T, E, F, Fut>(
        &self,
        deadline: Option<Instant>,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let deadline = [
            self.timeout.map(|t| Instant::now() + t),
            ambient_deadline(),
            deadline,
        ]
        .into_iter()
        .flatten()
        .min();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.max_attempts {
                return Err(error);
            }

            let delay = self.delay_for(attempt - 1);
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    warn!(attempt, error = %error, "Deadline reached, giving up");
                    return Err(error);
                }
            }

            warn!(attempt, ?delay, error = %error, "Attempt failed, retrying");
            tokio::time::sleep(delay).await;

            if let Some(hook) = &self.after_hook {
                hook(&AttemptInfo {
                    attempt,
                    delay,
                    error: error.to_string(),
                });
            }
        }
    }
}
