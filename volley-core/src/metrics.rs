/// Metric names emitted per attempt when the `metrics` feature of `volley` is enabled.
#[derive(Copy, Clone, Debug)]
pub struct AttemptLabels {
    pub success: &'static str,
    pub failure: &'static str,
    pub latency: &'static str,
    pub in_progress: &'static str,
}

pub const DEFAULT_LABELS: AttemptLabels = AttemptLabels {
    success: "volley_attempt_success",
    failure: "volley_attempt_failure",
    latency: "volley_attempt_latency",
    in_progress: "volley_attempts_in_progress",
};
