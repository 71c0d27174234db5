use crate::scenario::{AttemptContext, Scenario, ScenarioReport};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::{timeout, timeout_at, Instant};
#[allow(unused)]
use tracing::{debug, error, instrument, trace, warn};
use volley_core::{FailureKind, Outcome, MAX_CONFIG_DURATION};

/// Runs single scenario attempts and turns every way they can end into an [`Outcome`].
pub struct Executor<S> {
    scenario: Arc<S>,
    timeout: Duration,
}

impl<S: Scenario> Executor<S> {
    /// `timeout` is capped at [`MAX_CONFIG_DURATION`] so the attempt deadline stays
    /// representable.
    pub fn new(scenario: Arc<S>, timeout: Duration) -> Self {
        Self {
            scenario,
            timeout: timeout.min(MAX_CONFIG_DURATION),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one attempt.
    ///
    /// Session acquisition and the scenario run share one deadline of `timeout`. The session
    /// is released afterwards on every path; releasing is bounded by its own `timeout` so a
    /// stuck release can not hold up draining forever.
    #[instrument(name = "attempt", skip_all, fields(id = %ctx.attempt_id))]
    pub async fn execute(&self, ctx: AttemptContext) -> Outcome {
        let deadline = Instant::now() + self.timeout;

        let acquired = timeout_at(
            deadline,
            AssertUnwindSafe(self.scenario.acquire(&ctx)).catch_unwind(),
        )
        .await;

        let mut session = match acquired {
            Ok(Ok(Ok(session))) => session,
            Ok(Ok(Err(err))) => {
                return self.failed(
                    &ctx,
                    Duration::ZERO,
                    FailureKind::Session,
                    format!("failed to acquire session: {err}"),
                );
            }
            Ok(Err(panic)) => {
                return self.failed(
                    &ctx,
                    Duration::ZERO,
                    FailureKind::Panicked,
                    format!("session acquisition panicked: {}", panic_message(&*panic)),
                );
            }
            Err(_) => {
                return self.failed(
                    &ctx,
                    Duration::ZERO,
                    FailureKind::Timeout,
                    format!(
                        "session acquisition timed out after {}",
                        humantime::format_duration(self.timeout)
                    ),
                );
            }
        };

        let start = std::time::Instant::now();
        let ran = timeout_at(
            deadline,
            AssertUnwindSafe(self.scenario.run(&mut session, &ctx)).catch_unwind(),
        )
        .await;
        let elapsed = start.elapsed();

        self.release(session).await;

        let outcome = match ran {
            Ok(Ok(Ok(report))) => self.completed(&ctx, elapsed, report),
            Ok(Ok(Err(err))) => {
                self.failed(&ctx, elapsed, FailureKind::Scenario, err.to_string())
            }
            Ok(Err(panic)) => self.failed(
                &ctx,
                elapsed,
                FailureKind::Panicked,
                format!("scenario panicked: {}", panic_message(&*panic)),
            ),
            Err(_) => self.failed(
                &ctx,
                elapsed,
                FailureKind::Timeout,
                format!(
                    "scenario timed out after {}",
                    humantime::format_duration(self.timeout)
                ),
            ),
        };

        debug!(
            success = outcome.success,
            band = %outcome.latency_band(),
            "Attempt finished in {:.0}ms",
            outcome.duration_ms
        );

        #[cfg(feature = "metrics")]
        emit_metrics(&outcome);

        outcome
    }

    async fn release(&self, session: S::Session) {
        let released = timeout(
            self.timeout,
            AssertUnwindSafe(self.scenario.release(session)).catch_unwind(),
        )
        .await;

        match released {
            Ok(Ok(())) => trace!("Session released."),
            Ok(Err(panic)) => error!("Session release panicked: {}", panic_message(&*panic)),
            Err(_) => warn!(
                "Session release did not finish within {}",
                humantime::format_duration(self.timeout)
            ),
        }
    }

    fn completed(&self, ctx: &AttemptContext, elapsed: Duration, report: ScenarioReport) -> Outcome {
        let ScenarioReport {
            passed,
            status_code,
            value,
            aux_count,
            exchange,
            reason,
        } = report;

        Outcome {
            attempt_id: ctx.attempt_id.clone(),
            user_id: ctx.user_id,
            success: passed,
            duration_ms: as_millis(elapsed),
            value,
            status_code,
            error_message: if passed {
                None
            } else {
                Some(reason.unwrap_or_else(|| "scenario reported failure".to_string()))
            },
            failure_kind: (!passed).then_some(FailureKind::Rejected),
            timestamp: OffsetDateTime::now_utc(),
            aux_count,
            exchange,
        }
    }

    fn failed(
        &self,
        ctx: &AttemptContext,
        elapsed: Duration,
        kind: FailureKind,
        message: String,
    ) -> Outcome {
        debug!("Attempt failed ({kind}): {message}");
        Outcome {
            attempt_id: ctx.attempt_id.clone(),
            user_id: ctx.user_id,
            success: false,
            duration_ms: as_millis(elapsed),
            value: None,
            status_code: None,
            error_message: Some(message),
            failure_kind: Some(kind),
            timestamp: OffsetDateTime::now_utc(),
            aux_count: None,
            exchange: None,
        }
    }
}

#[cfg(feature = "metrics")]
fn emit_metrics(outcome: &Outcome) {
    let labels = volley_core::DEFAULT_LABELS;
    metrics::histogram!(labels.latency).record(outcome.duration_ms);
    if outcome.success {
        metrics::counter!(labels.success).increment(1);
    } else {
        metrics::counter!(labels.failure).increment(1);
    }
}

fn as_millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1_000.
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
