//! Live reporting hooks
use crate::error::RecorderError;
use std::io::Write;
use std::sync::Mutex;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use volley_core::{Phase, StatsView};

/// Receives what a running load test has to say.
///
/// Called from the orchestrator's own tasks, never from inside a virtual user's attempt.
pub trait Observer: Send + Sync {
    /// Periodic snapshot, once per render interval and once more when the run completes.
    fn on_snapshot(&self, view: &StatsView);

    fn on_phase(&self, _phase: Phase) {}

    fn on_telemetry_error(&self, _error: &RecorderError) {}
}

/// Logs snapshots and phase changes through `tracing`.
#[derive(Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_snapshot(&self, view: &StatsView) {
        info!("{view}");
    }

    fn on_phase(&self, phase: Phase) {
        info!("Load test phase: {phase}");
    }

    fn on_telemetry_error(&self, error: &RecorderError) {
        warn!("Telemetry write failed: {error}");
    }
}

/// Redraws a boxed statistics panel on a terminal.
pub struct ConsoleRenderer<W> {
    out: Mutex<W>,
    clear: bool,
}

impl ConsoleRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: Mutex::new(std::io::stdout()),
            clear: true,
        }
    }
}

impl<W: Write + Send> ConsoleRenderer<W> {
    /// Render into `out`, appending panels instead of clearing the screen between them.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            clear: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

const RULE: &str = "════════════════════════════════════════════════════";

/// The panel for one snapshot, without screen control sequences.
pub fn render_panel(view: &StatsView) -> String {
    let row = |label: &str, value: String| format!("║ {label:<18}{value:<32} ║\n");
    let title = |text: &str| format!("║{text:^52}║\n");

    let mut panel = String::new();
    panel.push_str(&format!("╔{RULE}╗\n"));
    panel.push_str(&title("LOAD TEST REAL-TIME METRICS"));
    panel.push_str(&format!("╠{RULE}╣\n"));
    panel.push_str(&row("Elapsed Time:", format!("{:.1}s", view.elapsed_secs)));
    panel.push_str(&row("Total Requests:", view.total.to_string()));
    panel.push_str(&row("Successful:", view.successful.to_string()));
    panel.push_str(&row("Failed:", view.failed.to_string()));
    panel.push_str(&row("In Progress:", view.in_progress.to_string()));
    panel.push_str(&row(
        "Success Rate:",
        format!("{:.2}%", view.success_rate * 100.),
    ));
    panel.push_str(&row("Requests/sec:", format!("{:.2}", view.throughput)));
    panel.push_str(&format!("╠{RULE}╣\n"));
    panel.push_str(&title("RESPONSE TIME METRICS"));
    panel.push_str(&format!("╠{RULE}╣\n"));
    panel.push_str(&row("Average:", format!("{:.0}ms", view.avg_latency_ms)));
    panel.push_str(&row("P50 (Median):", format!("{:.0}ms", view.p50_ms)));
    panel.push_str(&row("P95:", format!("{:.0}ms", view.p95_ms)));
    panel.push_str(&row("P99:", format!("{:.0}ms", view.p99_ms)));
    panel.push_str(&format!("╚{RULE}╝\n"));
    panel
}

impl<W: Write + Send> Observer for ConsoleRenderer<W> {
    fn on_snapshot(&self, view: &StatsView) {
        let panel = render_panel(view);
        let mut out = self.out.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let written = if self.clear {
            // Clear screen, cursor home
            write!(out, "\x1b[2J\x1b[H{panel}")
        } else {
            write!(out, "{panel}")
        };

        if let Err(err) = written.and_then(|_| out.flush()) {
            debug!("Failed to render statistics panel: {err}");
        }
    }

    fn on_phase(&self, phase: Phase) {
        debug!("Load test phase: {phase}");
    }

    fn on_telemetry_error(&self, error: &RecorderError) {
        warn!("Telemetry write failed: {error}");
    }
}
