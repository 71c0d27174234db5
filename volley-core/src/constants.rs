use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 10;

pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);

pub const DEFAULT_RAMP_UP: Duration = Duration::from_secs(5);

pub const DEFAULT_SCENARIO_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Pause between two attempts of the same virtual user.
pub const DEFAULT_ITERATION_DELAY: Duration = Duration::from_secs(1);

/// How often live statistics are handed to the observer.
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_secs(1);

/// Polling interval used while waiting for in-flight attempts to drain.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Attempts slower than this are logged as slow.
pub const SLOW_ATTEMPT: Duration = Duration::from_millis(2_000);

/// Attempts slower than this are logged as very slow.
pub const VERY_SLOW_ATTEMPT: Duration = Duration::from_millis(3_000);

/// Upper bound for every configured duration. Anything longer is rejected by
/// [`TestConfig::validate`](crate::TestConfig::validate).
pub const MAX_CONFIG_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);
