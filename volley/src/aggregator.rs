use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use time::OffsetDateTime;
use volley_core::{mean, percentile, sorted, Outcome, StatsView};

/// Streaming statistics for one load test run.
///
/// Every mutation goes through one mutex, so outcomes from concurrently finishing virtual users
/// never interleave. Reads sort a copy of the latency samples; the ingest path stays O(1).
pub struct MetricsAggregator {
    stats: Mutex<RunningStats>,
    start: Instant,
    started_at: OffsetDateTime,
}

#[derive(Default)]
struct RunningStats {
    /// Successful durations in ingestion order.
    durations: Vec<f64>,
    success_count: u64,
    failure_count: u64,
    in_progress: u64,
    outcomes: Vec<Outcome>,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(RunningStats::default()),
            start: Instant::now(),
            started_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn ingest(&self, outcome: &Outcome) {
        let mut stats = self.lock();
        if outcome.success {
            stats.success_count += 1;
            stats.durations.push(outcome.duration_ms);
        } else {
            stats.failure_count += 1;
        }

        // Exchanges can be large; the telemetry stream is where they live.
        stats.outcomes.push(Outcome {
            exchange: None,
            ..outcome.clone()
        });
    }

    /// Mark an attempt as started. The returned guard marks it finished when dropped.
    pub fn track(&self) -> InProgress<'_> {
        let mut stats = self.lock();
        stats.in_progress += 1;

        #[cfg(feature = "metrics")]
        metrics::gauge!(volley_core::DEFAULT_LABELS.in_progress).set(stats.in_progress as f64);

        InProgress { aggregator: self }
    }

    pub fn in_progress(&self) -> u64 {
        self.lock().in_progress
    }

    pub fn percentile(&self, quantile: f64) -> f64 {
        let durations = sorted(&self.lock().durations);
        percentile(&durations, quantile)
    }

    pub fn snapshot(&self) -> StatsView {
        let (durations, successful, failed, in_progress) = {
            let stats = self.lock();
            (
                stats.durations.clone(),
                stats.success_count,
                stats.failure_count,
                stats.in_progress,
            )
        };

        let elapsed_secs = self.start.elapsed().as_secs_f64();
        let total = successful + failed;
        let avg_latency_ms = mean(&durations);
        let durations = sorted(&durations);

        StatsView {
            elapsed_secs,
            total,
            successful,
            failed,
            in_progress,
            success_rate: if total == 0 {
                0.
            } else {
                successful as f64 / total as f64
            },
            throughput: if elapsed_secs > 0. {
                total as f64 / elapsed_secs
            } else {
                0.
            },
            avg_latency_ms,
            p50_ms: percentile(&durations, 0.50),
            p95_ms: percentile(&durations, 0.95),
            p99_ms: percentile(&durations, 0.99),
        }
    }

    /// Every ingested outcome, in ingestion order, without exchange payloads.
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.lock().outcomes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunningStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An attempt in flight. See [`MetricsAggregator::track`].
pub struct InProgress<'a> {
    aggregator: &'a MetricsAggregator,
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        let mut stats = self.aggregator.lock();
        stats.in_progress = stats.in_progress.saturating_sub(1);

        #[cfg(feature = "metrics")]
        metrics::gauge!(volley_core::DEFAULT_LABELS.in_progress).set(stats.in_progress as f64);
    }
}
