use thiserror::Error;

/// Rejected [`TestConfig`](crate::TestConfig) values. Always fatal, raised before any virtual
/// user is spawned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("concurrency must be a positive integer, got {0}")]
    Concurrency(usize),

    #[error("duration must be a positive number of seconds, at most a year, got {0}")]
    Duration(f64),

    #[error("ramp-up must be a non-negative number of seconds, at most a year, got {0}")]
    RampUp(f64),

    #[error("scenario timeout must be a positive number of milliseconds, at most a year, got {0}")]
    ScenarioTimeout(f64),

    #[error("iteration delay must be at most a year, got {0} seconds")]
    IterationDelay(f64),

    #[error("render interval must be non-zero and at most a year")]
    RenderInterval,
}
