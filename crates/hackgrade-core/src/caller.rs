//! Single backend call under the shared limiter, with retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::backend::ModelBackend;
use crate::error::{GradeError, GradeResult};
use crate::limiter::ConcurrencyLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy, Sleeper, TokioSleeper};

/// Grading is determinism-seeking; the backend still may not be deterministic.
pub const TEMPERATURE: f32 = 0.0;

#[derive(Clone)]
pub struct BackendCaller {
    backend: Arc<dyn ModelBackend>,
    limiter: ConcurrencyLimiter,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    call_timeout: Duration,
}

impl BackendCaller {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        limiter: ConcurrencyLimiter,
        policy: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            limiter,
            policy,
            sleeper: Arc::new(TokioSleeper),
            call_timeout,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    /// Complete `prompt` with `model`.
    ///
    /// Each attempt holds one limiter slot for the call only; the slot is free
    /// again while backing off. A call exceeding the timeout counts as a failure.
    pub async fn call(&self, prompt: &str, model: &str) -> GradeResult<String> {
        let result = retry_with_backoff(&self.policy, self.sleeper.as_ref(), model, |attempt| {
            async move {
                let _permit = self.limiter.acquire().await.map_err(anyhow::Error::from)?;
                debug!(model = model, attempt = attempt, "backend call");
                match tokio::time::timeout(
                    self.call_timeout,
                    self.backend.complete(prompt, model, TEMPERATURE),
                )
                .await
                {
                    Ok(res) => res,
                    Err(_) => Err(anyhow::anyhow!(
                        "backend call timed out after {}s",
                        self.call_timeout.as_secs_f64()
                    )),
                }
            }
        })
        .await;

        result.map_err(|exhausted| GradeError::Backend {
            model: model.to_string(),
            attempts: exhausted.attempts,
            message: format!("{:#}", exhausted.last_error),
        })
    }
}
