use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use volley_core::{mean, percentile, sorted, Record, Summary};

pub(super) const CSV_HEADER: &str =
    "RequestNumber,Timestamp,ResponseTime(ms),StatusCode,Success,Error\n";

/// The part of every record the summaries are built from.
#[derive(Default)]
pub(super) struct Rollup {
    entries: Vec<Entry>,
}

struct Entry {
    sequence: u64,
    duration_ms: f64,
    status_code: Option<u16>,
    success: bool,
}

impl Rollup {
    pub fn push(&mut self, record: &Record) {
        self.entries.push(Entry {
            sequence: record.sequence,
            duration_ms: record.outcome.duration_ms,
            status_code: record.outcome.status_code,
            success: record.outcome.success,
        });
    }

    pub fn summary(&self, elapsed: Duration) -> Option<Summary> {
        if self.entries.is_empty() {
            return None;
        }

        let durations: Vec<f64> = self.entries.iter().map(|e| e.duration_ms).collect();
        let durations = sorted(&durations);

        let successful = self.entries.iter().filter(|e| e.success).count() as u64;
        let total = self.entries.len() as u64;

        let mut status_codes = BTreeMap::new();
        for entry in &self.entries {
            *status_codes.entry(status_key(entry.status_code)).or_insert(0) += 1;
        }

        Some(Summary {
            total,
            successful,
            failed: total - successful,
            min_ms: durations.first().copied().unwrap_or_default(),
            max_ms: durations.last().copied().unwrap_or_default(),
            avg_ms: mean(&durations),
            p50_ms: percentile(&durations, 0.50),
            p95_ms: percentile(&durations, 0.95),
            p99_ms: percentile(&durations, 0.99),
            status_codes,
            duration_secs: elapsed.as_secs_f64(),
            generated_at: OffsetDateTime::now_utc(),
        })
    }

    /// Plain text rendering of `summary` followed by one row per record.
    pub fn render_text(&self, summary: &Summary) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Load Test Telemetry Summary");
        let _ = writeln!(out, "===========================\n");
        let _ = writeln!(out, "Total Requests: {}", summary.total);
        let _ = writeln!(out, "Successful: {}", summary.successful);
        let _ = writeln!(out, "Failed: {}", summary.failed);
        let _ = writeln!(out, "Test Duration: {:.2}s\n", summary.duration_secs);

        let _ = writeln!(out, "Response Time Statistics:");
        let _ = writeln!(out, "  Min: {:.0}ms", summary.min_ms);
        let _ = writeln!(out, "  Max: {:.0}ms", summary.max_ms);
        let _ = writeln!(out, "  Avg: {:.2}ms", summary.avg_ms);
        let _ = writeln!(out, "  Median: {:.0}ms", summary.p50_ms);
        let _ = writeln!(out, "  P95: {:.0}ms", summary.p95_ms);
        let _ = writeln!(out, "  P99: {:.0}ms\n", summary.p99_ms);

        let _ = writeln!(out, "Status Code Distribution:");
        for (code, count) in &summary.status_codes {
            let share = *count as f64 / summary.total.max(1) as f64 * 100.;
            let _ = writeln!(out, "  {code}: {count} ({share:.2}%)");
        }

        let _ = writeln!(out, "\nIndividual Request Times:");
        let _ = writeln!(out, "Request# | Time(ms) | Status");
        let _ = writeln!(out, "---------|----------|-------");
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{:>8} | {:>8.0} | {}",
                entry.sequence,
                entry.duration_ms,
                status_key(entry.status_code)
            );
        }

        out
    }
}

pub(super) fn csv_line(record: &Record) -> String {
    let outcome = &record.outcome;
    let timestamp = outcome
        .timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| outcome.timestamp.unix_timestamp().to_string());

    format!(
        "{},{},{:.0},{},{},{}\n",
        record.sequence,
        timestamp,
        outcome.duration_ms,
        outcome.status_code.map(|s| s.to_string()).unwrap_or_default(),
        outcome.success,
        csv_field(outcome.error_message.as_deref().unwrap_or_default()),
    )
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn status_key(status: Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}
