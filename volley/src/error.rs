use std::path::PathBuf;
use volley_core::ConfigError;

/// Errors which end a load test run.
#[derive(Debug, thiserror::Error)]
pub enum LoadTestError {
    #[error("Invalid load test configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to write the final report to {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize the final report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Setting up a [`TelemetryRecorder`](crate::TelemetryRecorder) failed before the run.
    #[error("Telemetry recorder failed: {0}")]
    Recorder(#[from] RecorderError),
}

/// Telemetry persistence errors. Never fatal while a run is in progress.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Failed to open telemetry file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write telemetry file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize telemetry record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to read telemetry file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed telemetry record at {path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
