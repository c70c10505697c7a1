//! Provider adapters grouped by role.
//!
//! Every role is a narrow trait; concrete vendors are sibling
//! implementations chosen at construction time. Remote calls run inside a
//! [`DriverEnvelope`], which pairs the driver's [`RetryPolicy`] with its
//! [`Instrumentation`] hook.

pub mod dummy;
pub mod embedding;
pub mod http;
pub mod image_generation;
pub mod parser;
pub mod prompt;
pub mod rerank;
pub mod sql;
pub mod storage;
pub mod vector;
pub mod web_scraper;

use std::{fmt, future::Future, sync::Arc};
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    error::RemoteFetchError,
    observability::{instrumented, Instrumentation, NoopInstrumentation},
    retry::{RetryPolicy, Retryable},
    runnable::HookError,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    #[error("{driver}.{operation}: {source}")]
    RemoteFetch {
        driver: &'static str,
        operation: &'static str,
        source: RemoteFetchError,
    },
    #[error("{driver}.{operation}: provider unavailable: {message}")]
    ProviderUnavailable {
        driver: &'static str,
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },
    #[error("{driver}.{operation}: context overflow: {message}")]
    ContextOverflow {
        driver: &'static str,
        operation: &'static str,
        message: String,
    },
    #[error("{driver}.{operation}: unauthorized: {message}")]
    Unauthorized {
        driver: &'static str,
        operation: &'static str,
        message: String,
    },
    #[error("{driver}.{operation}: parse error at byte {offset}: {message}")]
    Parse {
        driver: &'static str,
        operation: &'static str,
        offset: usize,
        message: String,
    },
    #[error("{driver}.{operation}: protocol error: {message}")]
    Protocol {
        driver: &'static str,
        operation: &'static str,
        message: String,
    },
    #[error("{driver}.{operation}: i/o error: {message}")]
    Io {
        driver: &'static str,
        operation: &'static str,
        message: String,
    },
    #[error("{driver}.{method} is not implemented by this placeholder driver")]
    Dummy {
        driver: &'static str,
        method: &'static str,
    },
    #[error("{driver}: invalid configuration: {message}")]
    Config {
        driver: &'static str,
        message: String,
    },
    #[error(transparent)]
    Hook(#[from] HookError),
}

impl DriverError {
    /// Maps a non-2xx answer onto the error taxonomy.
    #[must_use]
    pub fn from_response(
        driver: &'static str,
        operation: &'static str,
        url: &str,
        status: u16,
        body: String,
    ) -> Self {
        let lowered = body.to_lowercase();
        match status {
            401 | 403 => Self::Unauthorized {
                driver,
                operation,
                message: body,
            },
            413 => Self::ContextOverflow {
                driver,
                operation,
                message: body,
            },
            400 if lowered.contains("context_length_exceeded")
                || lowered.contains("maximum context length")
                || lowered.contains("too many tokens") =>
            {
                Self::ContextOverflow {
                    driver,
                    operation,
                    message: body,
                }
            }
            408 | 429 | 500..=599 => Self::ProviderUnavailable {
                driver,
                operation,
                status: Some(status),
                message: body,
            },
            _ => Self::RemoteFetch {
                driver,
                operation,
                source: RemoteFetchError::from_status(url, status, body),
            },
        }
    }

    /// Transport level failure, i.e. no HTTP answer was received.
    #[must_use]
    pub fn from_reqwest(
        driver: &'static str,
        operation: &'static str,
        url: &str,
        error: &reqwest::Error,
    ) -> Self {
        Self::RemoteFetch {
            driver,
            operation,
            source: RemoteFetchError::from_reqwest(url, error),
        }
    }

    pub fn protocol(driver: &'static str, operation: &'static str, message: impl fmt::Display) -> Self {
        Self::Protocol {
            driver,
            operation,
            message: message.to_string(),
        }
    }

    pub fn io(driver: &'static str, operation: &'static str, error: &std::io::Error) -> Self {
        Self::Io {
            driver,
            operation,
            message: error.to_string(),
        }
    }

    #[must_use]
    pub fn dummy(driver: &'static str, method: &'static str) -> Self {
        Self::Dummy { driver, method }
    }

    /// Name of the driver the error originated from, if known.
    #[must_use]
    pub fn driver(&self) -> Option<&'static str> {
        match self {
            Self::RemoteFetch { driver, .. }
            | Self::ProviderUnavailable { driver, .. }
            | Self::ContextOverflow { driver, .. }
            | Self::Unauthorized { driver, .. }
            | Self::Parse { driver, .. }
            | Self::Protocol { driver, .. }
            | Self::Io { driver, .. }
            | Self::Dummy { driver, .. }
            | Self::Config { driver, .. } => Some(driver),
            Self::Hook(_) => None,
        }
    }
}

impl Retryable for DriverError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteFetch { source, .. } => source.is_retryable(),
            Self::ProviderUnavailable { .. } => true,
            _ => false,
        }
    }
}

/// Retry policy and instrumentation of one driver.
#[derive(Clone)]
pub struct DriverEnvelope {
    pub retry_policy: RetryPolicy,
    pub instrumentation: Arc<dyn Instrumentation>,
}

impl fmt::Debug for DriverEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverEnvelope")
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl Default for DriverEnvelope {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            instrumentation: Arc::new(NoopInstrumentation),
        }
    }
}

impl DriverEnvelope {
    #[must_use]
    pub fn new(retry_policy: RetryPolicy, instrumentation: Arc<dyn Instrumentation>) -> Self {
        Self {
            retry_policy,
            instrumentation,
        }
    }

    /// Runs `op` under the retry policy and reports it to the instrumentation.
    pub async fn call<T, F, Fut>(
        &self,
        driver: &'static str,
        operation: &'static str,
        op: F,
    ) -> Result<T, DriverError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        self.call_until(driver, operation, None, op).await
    }

    /// [`DriverEnvelope::call`] that starts no attempt past `deadline`.
    pub async fn call_until<T, F, Fut>(
        &self,
        driver: &'static str,
        operation: &'static str,
        deadline: Option<Instant>,
        op: F,
    ) -> Result<T, DriverError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        instrumented(
            self.instrumentation.as_ref(),
            driver,
            operation,
            self.retry_policy.retrying_until(deadline, op),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::tests::RecordingInstrumentation;
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    #[test]
    fn test_status_mapping() {
        let map = |status, body: &str| DriverError::from_response("D", "op", "http://x", status, body.to_string());
        assert!(matches!(map(401, ""), DriverError::Unauthorized { .. }));
        assert!(matches!(map(403, ""), DriverError::Unauthorized { .. }));
        assert!(matches!(map(413, ""), DriverError::ContextOverflow { .. }));
        assert!(matches!(
            map(400, r#"{"error":{"code":"context_length_exceeded"}}"#),
            DriverError::ContextOverflow { .. }
        ));
        assert!(matches!(map(503, ""), DriverError::ProviderUnavailable { status: Some(503), .. }));
        assert!(matches!(map(429, ""), DriverError::ProviderUnavailable { .. }));
        match map(404, "missing") {
            DriverError::RemoteFetch { source, .. } => assert_eq!(source.status, Some(404)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_retryable_kinds() {
        let unavailable = DriverError::from_response("D", "op", "u", 502, String::new());
        let unauthorized = DriverError::from_response("D", "op", "u", 401, String::new());
        let overflow = DriverError::from_response("D", "op", "u", 413, String::new());
        assert!(unavailable.is_retryable());
        assert!(!unauthorized.is_retryable());
        assert!(!overflow.is_retryable());
        assert!(!DriverError::dummy("DummyPromptDriver", "try_complete").is_retryable());
    }

    #[test]
    fn test_message_names_driver_and_operation() {
        let err = DriverError::dummy("DummyPromptDriver", "try_complete");
        assert_eq!(
            err.to_string(),
            "DummyPromptDriver.try_complete is not implemented by this placeholder driver"
        );
        assert_eq!(err.driver(), Some("DummyPromptDriver"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_envelope_retries_and_reports_once() {
        let recorder = Arc::new(RecordingInstrumentation::default());
        let envelope = DriverEnvelope::new(
            RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(4), 3).unwrap(),
            recorder.clone(),
        );
        let calls = AtomicU32::new(0);
        let result = envelope
            .call("D", "op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        Err(DriverError::from_response("D", "op", "u", 503, String::new()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["start D.op".to_string(), "finish D.op true".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_applies_per_call() {
        let envelope = DriverEnvelope::new(
            RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(1), 5).unwrap(),
            Arc::new(NoopInstrumentation),
        );
        let unavailable = || async { Err::<(), _>(DriverError::from_response("D", "op", "u", 503, String::new())) };

        let calls = AtomicU32::new(0);
        let deadline = Instant::now() + Duration::from_millis(1500);
        let result = envelope
            .call_until("D", "op", Some(deadline), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                unavailable()
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(60)).await;
        calls.store(0, Ordering::SeqCst);
        let result = crate::retry::with_call_deadline(
            Instant::now() + Duration::from_millis(500),
            envelope.call("D", "op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                unavailable()
            }),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        calls.store(0, Ordering::SeqCst);
        let _ = envelope
            .call("D", "op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                unavailable()
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
