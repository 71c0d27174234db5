#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregator;
pub mod error;
pub mod executor;
pub mod observer;
pub mod recorder;
pub mod report;
pub mod scenario;

pub(crate) mod timer;
pub(crate) mod user;

pub use aggregator::MetricsAggregator;
pub use error::{LoadTestError, RecorderError};
pub use executor::Executor;
pub use load_test::LoadTest;
pub use observer::{ConsoleRenderer, Observer, TracingObserver};
pub use recorder::{read_records, TelemetryRecorder};
pub use report::TestReport;
pub use scenario::{scenario_fn, AttemptContext, Scenario, ScenarioReport};
pub use volley_core::{
    ConfigError, Exchange, FailureKind, Outcome, Phase, Record, SamplePolicy, StatsView, Summary,
    TestConfig, TimingBreakdown,
};

pub mod prelude {
    pub use crate::error::{LoadTestError, RecorderError};
    pub use crate::load_test::LoadTest;
    pub use crate::observer::{ConsoleRenderer, Observer, TracingObserver};
    pub use crate::recorder::TelemetryRecorder;
    pub use crate::report::TestReport;
    pub use crate::scenario::{scenario_fn, AttemptContext, Scenario, ScenarioReport};

    pub use volley_core::{Exchange, Outcome, Phase, SamplePolicy, StatsView, TestConfig};
}
