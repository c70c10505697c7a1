use std::sync::Arc;
use tracing::{debug, warn};

/// Instrumentation hook handed to driver constructors.
///
/// Drivers report every operation they perform; the default implementation
/// does nothing.
pub trait Instrumentation: Send + Sync {
    fn on_start(&self, _driver: &str, _operation: &str) {}
    fn on_finish(&self, _driver: &str, _operation: &str, _success: bool) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {}

/// Emits a `tracing` event per driver operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInstrumentation;

impl Instrumentation for TracingInstrumentation {
    fn on_start(&self, driver: &str, operation: &str) {
        debug!(driver, operation, "Driver operation started");
    }

    fn on_finish(&self, driver: &str, operation: &str, success: bool) {
        if success {
            debug!(driver, operation, "Driver operation finished");
        } else {
            warn!(driver, operation, "Driver operation failed");
        }
    }
}

#[must_use]
pub fn noop() -> Arc<dyn Instrumentation> {
    Arc::new(NoopInstrumentation)
}

/// Reports start and finish of `fut` to `instrumentation`.
pub(crate) async fn instrumented<T, E>(
    instrumentation: &dyn Instrumentation,
    driver: &str,
    operation: &str,
    fut: impl std::future::Future<Output = Result<T, E>>,
) -> Result<T, E> {
    instrumentation.on_start(driver, operation);
    let result = fut.await;
    instrumentation.on_finish(driver, operation, result.is_ok());
    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every event, used by driver tests.
    #[derive(Default)]
    pub(crate) struct RecordingInstrumentation {
        pub(crate) events: Mutex<Vec<String>>,
    }

    impl Instrumentation for RecordingInstrumentation {
        fn on_start(&self, driver: &str, operation: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {driver}.{operation}"));
        }

        fn on_finish(&self, driver: &str, operation: &str, success: bool) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finish {driver}.{operation} {success}"));
        }
    }

    #[tokio::test]
    async fn test_instrumented_reports_outcome() {
        let recorder = RecordingInstrumentation::default();
        let ok: Result<u8, ()> = instrumented(&recorder, "D", "op", async { Ok(1) }).await;
        let err: Result<u8, ()> = instrumented(&recorder, "D", "op", async { Err(()) }).await;
        assert_eq!(ok, Ok(1));
        assert_eq!(err, Err(()));
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                "start D.op".to_string(),
                "finish D.op true".to_string(),
                "start D.op".to_string(),
                "finish D.op false".to_string(),
            ]
        );
    }
}
