use std::{fmt, future::Future, sync::Arc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{hook} hook failed: {message}")]
pub struct HookError {
    pub hook: &'static str,
    pub message: String,
}

impl HookError {
    pub fn new(hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
        }
    }
}

/// What the hooks get to see about the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext<'a> {
    pub component: &'a str,
}

pub type RunHook = Arc<dyn Fn(&RunContext<'_>) -> Result<(), HookError> + Send + Sync>;

/// Optional `before_run` / `after_run` callbacks of a runnable component.
#[derive(Clone, Default)]
pub struct RunHooks {
    before_run: Option<RunHook>,
    after_run: Option<RunHook>,
}

impl fmt::Debug for RunHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHooks")
            .field("before_run", &self.before_run.is_some())
            .field("after_run", &self.after_run.is_some())
            .finish()
    }
}

impl RunHooks {
    #[must_use]
    pub fn with_before_run(
        mut self,
        hook: impl Fn(&RunContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.before_run = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn with_after_run(
        mut self,
        hook: impl Fn(&RunContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.after_run = Some(Arc::new(hook));
        self
    }

    /// Runs `fut` between the two hooks.
    ///
    /// A failing `before_run` aborts before `fut` is polled. `after_run` fires
    /// whether `fut` succeeded or not; its error is only returned when `fut`
    /// itself succeeded.
    pub async fn run<T, E, Fut>(&self, component: &str, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<HookError>,
    {
        let context = RunContext { component };
        if let Some(before) = &self.before_run {
            before(&context)?;
        }

        let result = fut.await;

        let after = match &self.after_run {
            Some(after) => after(&context),
            None => Ok(()),
        };

        match (result, after) {
            (Err(primary), _) => Err(primary),
            (Ok(_), Err(hook_error)) => Err(hook_error.into()),
            (Ok(value), Ok(())) => Ok(value),
        }
    }
}
