use crate::{SLOW_ATTEMPT, VERY_SLOW_ATTEMPT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;

/// Result of a single scenario attempt.
///
/// `duration_ms` runs from the start of the scenario's run phase (after its session has been
/// acquired) to the scenario's terminal result. Failed attempts carry the elapsed time as well,
/// but only successful durations feed the latency statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub attempt_id: String,
    pub user_id: usize,
    pub success: bool,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<Exchange>,
}

impl Outcome {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_ms.max(0.) / 1_000.)
    }

    pub fn is_timeout(&self) -> bool {
        self.failure_kind == Some(FailureKind::Timeout)
    }

    pub fn latency_band(&self) -> LatencyBand {
        LatencyBand::of(self.duration())
    }
}

/// Why an attempt was counted as a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The attempt did not finish within the per-scenario timeout.
    Timeout,
    /// The scenario's session (browser, connection pool, ...) could not be acquired.
    Session,
    /// The scenario returned an error: failed assertion, navigation or transport error.
    Scenario,
    /// The scenario finished but reported a result it does not consider a success.
    Rejected,
    /// The scenario panicked.
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Session => "session",
            FailureKind::Scenario => "scenario",
            FailureKind::Rejected => "rejected",
            FailureKind::Panicked => "panicked",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatencyBand {
    Fast,
    Slow,
    VerySlow,
}

impl LatencyBand {
    pub fn of(latency: Duration) -> Self {
        if latency > VERY_SLOW_ATTEMPT {
            LatencyBand::VerySlow
        } else if latency > SLOW_ATTEMPT {
            LatencyBand::Slow
        } else {
            LatencyBand::Fast
        }
    }
}

impl fmt::Display for LatencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LatencyBand::Fast => "fast",
            LatencyBand::Slow => "slow",
            LatencyBand::VerySlow => "very-slow",
        };
        f.write_str(name)
    }
}

/// Request/response metadata captured by the transport a scenario drives.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub response_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<TimingBreakdown>,
}

/// Phase timings in milliseconds, whichever the transport is able to report.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_byte_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_ms: Option<f64>,
    pub total_ms: f64,
}

/// One persisted telemetry line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// 1-based position of the record in its telemetry stream.
    pub sequence: u64,
    pub pid: u32,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Point-in-time view of the running statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub elapsed_secs: f64,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub in_progress: u64,
    /// Fraction in `[0, 1]` of finished attempts that succeeded.
    pub success_rate: f64,
    /// Finished attempts per second since the start of the run.
    pub throughput: f64,
    pub avg_latency_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl fmt::Display for StatsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "elapsed={:.1}s total={} ok={} failed={} in_progress={} success={:.2}% rps={:.2} avg={:.0}ms p50={:.0}ms p95={:.0}ms p99={:.0}ms",
            self.elapsed_secs,
            self.total,
            self.successful,
            self.failed,
            self.in_progress,
            self.success_rate * 100.,
            self.throughput,
            self.avg_latency_ms,
            self.p50_ms,
            self.p95_ms,
            self.p99_ms,
        )
    }
}

/// Rolled-up view over every record a telemetry recorder has seen.
///
/// Unlike [`StatsView`], latency figures here cover every recorded attempt, failed ones
/// included, since the telemetry stream is about what the target actually did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    /// Keyed by status code, `"none"` for attempts that never got a response.
    pub status_codes: BTreeMap<String, u64>,
    pub duration_secs: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

/// Lifecycle of a load test run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Configured,
    RampingUp,
    Running,
    Draining,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Configured => "CONFIGURED",
            Phase::RampingUp => "RAMPING_UP",
            Phase::Running => "RUNNING",
            Phase::Draining => "DRAINING",
            Phase::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}
