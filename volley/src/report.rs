use crate::error::LoadTestError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::OffsetDateTime;
use volley_core::{Outcome, StatsView, Summary, TestConfig};

/// Everything a finished load test produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub run_id: String,
    /// Final snapshot, taken once every virtual user has stopped.
    pub summary: StatsView,
    /// Every outcome in the order it was ingested. Exchange detail only lives in telemetry.
    pub results: Vec<Outcome>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub config: TestConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Summary>,
    pub telemetry_write_failures: u64,
}

impl TestReport {
    /// Write the report as pretty-printed JSON, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LoadTestError> {
        let path = path.as_ref();
        let io_err = |source| LoadTestError::Report {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json).map_err(io_err)
    }
}
