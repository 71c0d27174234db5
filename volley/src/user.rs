use crate::aggregator::MetricsAggregator;
use crate::executor::Executor;
use crate::observer::Observer;
use crate::recorder::TelemetryRecorder;
use crate::scenario::{AttemptContext, Scenario};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};
use volley_core::{LatencyBand, Outcome};

/// Per-run state every virtual user works against.
pub(crate) struct Shared<S> {
    pub executor: Executor<S>,
    pub aggregator: Arc<MetricsAggregator>,
    pub recorder: Option<Arc<TelemetryRecorder>>,
    pub observer: Arc<dyn Observer>,
    pub run_id: String,
    pub headless: bool,
    pub iteration_delay: Duration,
}

pub(crate) struct VirtualUser<S> {
    id: usize,
    shared: Arc<Shared<S>>,
}

impl<S: Scenario> VirtualUser<S> {
    pub fn new(id: usize, shared: Arc<Shared<S>>) -> Self {
        Self { id, shared }
    }

    /// Run attempts back to back until `stop` flips to `true`, returning how many were made.
    ///
    /// The stop signal is checked between attempts; an attempt in flight always runs to its
    /// own completion or timeout.
    #[instrument(name = "user", skip_all, fields(id = self.id))]
    pub async fn run(self, mut stop: watch::Receiver<bool>) -> u64 {
        let shared = &self.shared;
        let mut iteration = 0;
        trace!("Virtual user started.");

        while !*stop.borrow() {
            iteration += 1;
            let ctx = AttemptContext::new(
                &shared.run_id,
                self.id,
                iteration,
                shared.executor.timeout(),
                shared.headless,
            );

            let in_progress = shared.aggregator.track();
            let outcome = shared.executor.execute(ctx).await;
            shared.aggregator.ingest(&outcome);
            drop(in_progress);

            self.report(&outcome);

            if shared.iteration_delay.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }

            let sender_gone = tokio::select! {
                _ = tokio::time::sleep(shared.iteration_delay) => false,
                changed = stop.changed() => changed.is_err(),
            };
            if sender_gone {
                debug!("Stop signal dropped, ending virtual user.");
                break;
            }
        }

        trace!("Virtual user stopped after {iteration} attempts.");
        iteration
    }

    fn report(&self, outcome: &Outcome) {
        match outcome.latency_band() {
            LatencyBand::Fast => {}
            band => warn!(
                "Attempt {} was {band}: {:.0}ms",
                outcome.attempt_id, outcome.duration_ms
            ),
        }

        if let Some(recorder) = &self.shared.recorder {
            if let Err(err) = recorder.record(outcome) {
                error!("Failed to record attempt {}: {err}", outcome.attempt_id);
                self.shared.observer.on_telemetry_error(&err);
            }
        }
    }
}
