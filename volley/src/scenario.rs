//! Scenario contract
//!
//! A scenario is one complete interaction a virtual user performs against the target. Volley
//! knows nothing about what happens inside it; it only acquires the scenario's session, runs
//! it under a timeout, and releases the session again.
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use volley_core::Exchange;

/// Everything a scenario is told about the attempt it is running.
#[derive(Clone, Debug)]
pub struct AttemptContext {
    /// Unique within a run, and across runs started at different milliseconds.
    pub attempt_id: String,
    pub user_id: usize,
    /// 1-based attempt counter of the owning virtual user.
    pub iteration: u64,
    pub timeout: Duration,
    pub headless: bool,
}

impl AttemptContext {
    pub fn new(
        run_id: &str,
        user_id: usize,
        iteration: u64,
        timeout: Duration,
        headless: bool,
    ) -> Self {
        Self {
            attempt_id: format!("{run_id}-u{user_id}-{iteration}"),
            user_id,
            iteration,
            timeout,
            headless,
        }
    }
}

/// What a scenario signals back once it ran to completion.
#[derive(Clone, Debug, Default)]
pub struct ScenarioReport {
    pub passed: bool,
    pub status_code: Option<u16>,
    pub value: Option<Value>,
    pub aux_count: Option<u64>,
    pub exchange: Option<Exchange>,
    /// Why the scenario considers the attempt failed.
    pub reason: Option<String>,
}

impl ScenarioReport {
    pub fn success() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Passed only when the terminal response carried the expected status.
    pub fn expect_status(status: u16, expected: u16) -> Self {
        let passed = status == expected;
        Self {
            passed,
            status_code: Some(status),
            reason: (!passed).then(|| format!("expected status {expected}, got {status}")),
            ..Default::default()
        }
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn aux_count(mut self, count: u64) -> Self {
        self.aux_count = Some(count);
        self
    }

    pub fn exchange(mut self, exchange: Exchange) -> Self {
        if self.status_code.is_none() {
            self.status_code = exchange.status;
        }
        self.exchange = Some(exchange);
        self
    }
}

/// A multi-step interaction driven once per attempt.
///
/// `acquire` and `release` bracket every attempt: whatever `acquire` hands out is released on
/// every exit path of the attempt, including timeouts and panics inside `run`.
///
/// # Example
/// ```no_run
/// use volley::prelude::*;
///
/// struct Browse;
///
/// impl Scenario for Browse {
///     type Session = Vec<String>;
///     type Error = std::io::Error;
///
///     async fn acquire(&self, _ctx: &AttemptContext) -> Result<Self::Session, Self::Error> {
///         Ok(vec![])
///     }
///
///     async fn run(
///         &self,
///         visited: &mut Self::Session,
///         _ctx: &AttemptContext,
///     ) -> Result<ScenarioReport, Self::Error> {
///         visited.push("/".to_string());
///         Ok(ScenarioReport::expect_status(200, 200).aux_count(visited.len() as u64))
///     }
///
///     async fn release(&self, _visited: Self::Session) {}
/// }
/// ```
pub trait Scenario: Send + Sync + 'static {
    type Session: Send + 'static;
    type Error: Display + Send + 'static;

    fn acquire(
        &self,
        ctx: &AttemptContext,
    ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send;

    fn run(
        &self,
        session: &mut Self::Session,
        ctx: &AttemptContext,
    ) -> impl Future<Output = Result<ScenarioReport, Self::Error>> + Send;

    fn release(&self, session: Self::Session) -> impl Future<Output = ()> + Send;
}

/// Session-less scenario backed by a closure. See [`scenario_fn`].
pub struct FnScenario<F> {
    func: F,
}

/// Wrap an async closure as a [`Scenario`] without a session.
///
/// # Example
/// ```no_run
/// use volley::prelude::*;
/// use std::time::Duration;
///
/// # async fn demo() {
/// let scenario = scenario_fn(|_ctx| async move {
///     tokio::time::sleep(Duration::from_millis(100)).await;
///     Ok::<_, std::io::Error>(ScenarioReport::success())
/// });
///
/// let report = LoadTest::new(scenario, TestConfig::default()).await;
/// # }
/// ```
pub fn scenario_fn<F, Fut, E>(func: F) -> FnScenario<F>
where
    F: Fn(AttemptContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ScenarioReport, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    FnScenario { func }
}

impl<F, Fut, E> Scenario for FnScenario<F>
where
    F: Fn(AttemptContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ScenarioReport, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    type Session = ();
    type Error = E;

    async fn acquire(&self, _ctx: &AttemptContext) -> Result<(), E> {
        Ok(())
    }

    async fn run(&self, _session: &mut (), ctx: &AttemptContext) -> Result<ScenarioReport, E> {
        (self.func)(ctx.clone()).await
    }

    async fn release(&self, _session: ()) {}
}
