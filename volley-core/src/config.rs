use crate::{
    ConfigError, DEFAULT_CONCURRENCY, DEFAULT_DURATION, DEFAULT_ITERATION_DELAY,
    DEFAULT_RAMP_UP, DEFAULT_RENDER_INTERVAL, DEFAULT_SCENARIO_TIMEOUT, MAX_CONFIG_DURATION,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSecondsWithFrac};
use std::num::NonZeroU64;
use std::time::Duration;

/// Load test configuration
///
/// Immutable for the lifetime of a run. Use [`TestConfig::from_numbers`] when the values come
/// from an untrusted surface (flags, environment), otherwise the builder methods on top of
/// [`Default`]. Either way the orchestrator calls [`TestConfig::validate`] before any virtual
/// user is spawned.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    pub concurrency: usize,

    #[serde(rename = "durationSeconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,

    #[serde(rename = "rampUpSeconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub ramp_up: Duration,

    #[serde(rename = "perScenarioTimeoutMs")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub scenario_timeout: Duration,

    pub headless: bool,

    #[serde(rename = "iterationDelayMs", default = "default_iteration_delay")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub iteration_delay: Duration,

    #[serde(rename = "renderIntervalMs", default = "default_render_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub render_interval: Duration,

    #[serde(default)]
    pub sample_policy: SamplePolicy,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            duration: DEFAULT_DURATION,
            ramp_up: DEFAULT_RAMP_UP,
            scenario_timeout: DEFAULT_SCENARIO_TIMEOUT,
            headless: true,
            iteration_delay: DEFAULT_ITERATION_DELAY,
            render_interval: DEFAULT_RENDER_INTERVAL,
            sample_policy: SamplePolicy::default(),
        }
    }
}

impl TestConfig {
    /// Build a configuration from raw numbers, rejecting anything outside the accepted ranges.
    ///
    /// # Example
    /// ```
    /// use volley_core::TestConfig;
    ///
    /// let config = TestConfig::from_numbers(3, 2., 0., 500., true).unwrap();
    /// assert_eq!(config.concurrency, 3);
    /// assert!(TestConfig::from_numbers(3, -1., 0., 500., true).is_err());
    /// ```
    pub fn from_numbers(
        concurrency: usize,
        duration_secs: f64,
        ramp_up_secs: f64,
        scenario_timeout_ms: f64,
        headless: bool,
    ) -> Result<Self, ConfigError> {
        if concurrency == 0 {
            return Err(ConfigError::Concurrency(concurrency));
        }
        if !duration_secs.is_finite() || duration_secs <= 0. {
            return Err(ConfigError::Duration(duration_secs));
        }
        if !ramp_up_secs.is_finite() || ramp_up_secs < 0. {
            return Err(ConfigError::RampUp(ramp_up_secs));
        }
        if !scenario_timeout_ms.is_finite() || scenario_timeout_ms <= 0. {
            return Err(ConfigError::ScenarioTimeout(scenario_timeout_ms));
        }

        let config = Self {
            concurrency,
            duration: Duration::try_from_secs_f64(duration_secs)
                .map_err(|_| ConfigError::Duration(duration_secs))?,
            ramp_up: Duration::try_from_secs_f64(ramp_up_secs)
                .map_err(|_| ConfigError::RampUp(ramp_up_secs))?,
            scenario_timeout: Duration::try_from_secs_f64(scenario_timeout_ms / 1_000.)
                .map_err(|_| ConfigError::ScenarioTimeout(scenario_timeout_ms))?,
            headless,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Every duration must fit under [`MAX_CONFIG_DURATION`], so deadlines derived from them
    /// can not overflow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Concurrency(self.concurrency));
        }
        if self.duration.is_zero() || self.duration > MAX_CONFIG_DURATION {
            return Err(ConfigError::Duration(self.duration.as_secs_f64()));
        }
        if self.ramp_up > MAX_CONFIG_DURATION {
            return Err(ConfigError::RampUp(self.ramp_up.as_secs_f64()));
        }
        if self.scenario_timeout.is_zero() || self.scenario_timeout > MAX_CONFIG_DURATION {
            return Err(ConfigError::ScenarioTimeout(
                self.scenario_timeout.as_secs_f64() * 1_000.,
            ));
        }
        if self.iteration_delay > MAX_CONFIG_DURATION {
            return Err(ConfigError::IterationDelay(
                self.iteration_delay.as_secs_f64(),
            ));
        }
        if self.render_interval.is_zero() || self.render_interval > MAX_CONFIG_DURATION {
            return Err(ConfigError::RenderInterval);
        }
        Ok(())
    }

    /// Delay between two consecutive virtual user spawns during ramp-up.
    pub fn ramp_up_delay(&self) -> Duration {
        if self.ramp_up.is_zero() || self.concurrency == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(self.ramp_up.as_secs_f64() / self.concurrency as f64)
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn ramp_up(mut self, ramp_up: Duration) -> Self {
        self.ramp_up = ramp_up;
        self
    }

    pub fn scenario_timeout(mut self, timeout: Duration) -> Self {
        self.scenario_timeout = timeout;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn iteration_delay(mut self, delay: Duration) -> Self {
        self.iteration_delay = delay;
        self
    }

    pub fn render_interval(mut self, interval: Duration) -> Self {
        self.render_interval = interval;
        self
    }

    pub fn sample_policy(mut self, policy: SamplePolicy) -> Self {
        self.sample_policy = policy;
        self
    }
}

fn default_iteration_delay() -> Duration {
    DEFAULT_ITERATION_DELAY
}

fn default_render_interval() -> Duration {
    DEFAULT_RENDER_INTERVAL
}

/// Which telemetry records keep their full request/response detail.
///
/// Records that are not selected are still written, just without the exchange payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplePolicy {
    #[default]
    All,
    None,
    /// Keep detail for records whose 1-based sequence number is a multiple of `n`.
    EveryNth(NonZeroU64),
}

impl SamplePolicy {
    pub fn keeps_detail(&self, sequence: u64) -> bool {
        match self {
            SamplePolicy::All => true,
            SamplePolicy::None => false,
            SamplePolicy::EveryNth(n) => sequence % n.get() == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_numbers() {
        assert_eq!(
            TestConfig::from_numbers(0, 1., 0., 1., true),
            Err(ConfigError::Concurrency(0))
        );
        assert_eq!(
            TestConfig::from_numbers(1, 0., 0., 1., true),
            Err(ConfigError::Duration(0.))
        );
        assert_eq!(
            TestConfig::from_numbers(1, 1., -0.5, 1., true),
            Err(ConfigError::RampUp(-0.5))
        );
        assert!(matches!(
            TestConfig::from_numbers(1, 1., 0., f64::NAN, true),
            Err(ConfigError::ScenarioTimeout(_))
        ));
    }

    #[test]
    fn huge_finite_numbers_are_rejected() {
        assert_eq!(
            TestConfig::from_numbers(3, 1e20, 0., 500., true),
            Err(ConfigError::Duration(1e20))
        );
        assert_eq!(
            TestConfig::from_numbers(3, 1., 1e20, 500., true),
            Err(ConfigError::RampUp(1e20))
        );
        assert_eq!(
            TestConfig::from_numbers(3, 1., 0., 1e30, true),
            Err(ConfigError::ScenarioTimeout(1e30))
        );
        // Representable, but past the upper bound.
        assert!(matches!(
            TestConfig::from_numbers(3, 1e9, 0., 500., true),
            Err(ConfigError::Duration(_))
        ));
    }

    #[test]
    fn durations_past_the_bound_fail_validation() {
        let config = TestConfig::default();
        assert_eq!(config.validate(), Ok(()));

        let long = MAX_CONFIG_DURATION + Duration::from_secs(1);
        assert!(matches!(
            config.clone().duration(Duration::MAX).validate(),
            Err(ConfigError::Duration(_))
        ));
        assert!(matches!(
            config.clone().ramp_up(long).validate(),
            Err(ConfigError::RampUp(_))
        ));
        assert!(matches!(
            config.clone().scenario_timeout(Duration::MAX).validate(),
            Err(ConfigError::ScenarioTimeout(_))
        ));
        assert!(matches!(
            config.clone().iteration_delay(long).validate(),
            Err(ConfigError::IterationDelay(_))
        ));
        assert_eq!(
            config.render_interval(Duration::MAX).validate(),
            Err(ConfigError::RenderInterval)
        );
        assert_eq!(
            TestConfig::default().duration(MAX_CONFIG_DURATION).validate(),
            Ok(())
        );
    }

    #[test]
    fn ramp_up_delay_is_spread_evenly() {
        let config = TestConfig::default()
            .concurrency(4)
            .ramp_up(Duration::from_secs(2));
        assert_eq!(config.ramp_up_delay(), Duration::from_millis(500));

        let config = config.ramp_up(Duration::ZERO);
        assert_eq!(config.ramp_up_delay(), Duration::ZERO);
    }

    #[test]
    fn zero_render_interval_is_invalid() {
        let config = TestConfig::default().render_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::RenderInterval));
    }

    #[test]
    fn every_nth_sampling() {
        let policy = SamplePolicy::EveryNth(NonZeroU64::new(10).unwrap());
        let kept: Vec<u64> = (1..=30).filter(|seq| policy.keeps_detail(*seq)).collect();
        assert_eq!(kept, vec![10, 20, 30]);
        assert!(SamplePolicy::All.keeps_detail(1));
        assert!(!SamplePolicy::None.keeps_detail(1));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: TestConfig = serde_json::from_value(serde_json::json!({
            "concurrency": 3,
            "durationSeconds": 2.5,
            "rampUpSeconds": 0,
            "perScenarioTimeoutMs": 500,
            "headless": false,
        }))
        .unwrap();

        assert_eq!(config.duration, Duration::from_millis(2_500));
        assert_eq!(config.scenario_timeout, Duration::from_millis(500));
        assert_eq!(config.iteration_delay, DEFAULT_ITERATION_DELAY);
        assert_eq!(config.sample_policy, SamplePolicy::All);
    }
}
