mod utils;
#[allow(unused)]
use utils::*;

use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal};
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use volley::prelude::*;
use volley::{read_records, FailureKind};

/// Hands out numbered sessions and fails a share of attempts in different ways.
struct Flaky {
    rng: Mutex<SmallRng>,
    acquired: Arc<AtomicU64>,
    released: Arc<AtomicU64>,
}

impl Flaky {
    fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
            acquired: Arc::default(),
            released: Arc::default(),
        }
    }

    fn roll(&self) -> (f64, u32) {
        let mut rng = self.rng.lock().unwrap();
        let latency: f64 = LogNormal::new(3.5, 0.4).unwrap().sample(&mut *rng);
        (latency.min(400.), rng.gen_range(0..10))
    }
}

impl Scenario for Flaky {
    type Session = u64;
    type Error = anyhow::Error;

    async fn acquire(&self, _ctx: &AttemptContext) -> anyhow::Result<u64> {
        Ok(self.acquired.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn run(&self, session: &mut u64, _ctx: &AttemptContext) -> anyhow::Result<ScenarioReport> {
        let (latency_ms, dice) = self.roll();
        tokio::time::sleep(Duration::from_secs_f64(latency_ms / 1_000.)).await;

        match dice {
            0 => anyhow::bail!("locator.click: Timeout 30000ms exceeded"),
            1 => Ok(ScenarioReport::expect_status(500, 200)),
            2 => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ScenarioReport::success())
            }
            _ => Ok(ScenarioReport::expect_status(200, 200)
                .value(*session)
                .exchange(Exchange {
                    method: "POST".to_string(),
                    url: "http://localhost/loadSim".to_string(),
                    status: Some(200),
                    ..Default::default()
                })),
        }
    }

    async fn release(&self, _session: u64) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn full_run_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("load-test-results");
    let telemetry = out.join("telemetry.ndjson");
    let report_path = out.join("load-test-report.json");

    let recorder = TelemetryRecorder::create(&telemetry)
        .unwrap()
        .with_csv(out.join("telemetry.csv"))
        .unwrap()
        .with_error_stream(out.join("errors.ndjson"))
        .unwrap();

    let flaky = Flaky::new(42);
    let (acquired, released) = (flaky.acquired.clone(), flaky.released.clone());
    let config = TestConfig::default()
        .concurrency(6)
        .duration(Duration::from_secs(3))
        .ramp_up(Duration::from_millis(600))
        .scenario_timeout(Duration::from_millis(500))
        .iteration_delay(Duration::from_millis(20))
        .render_interval(Duration::from_millis(250))
        .sample_policy(SamplePolicy::EveryNth(NonZeroU64::new(5).unwrap()));

    let report = LoadTest::new(flaky, config)
        .recorder(recorder)
        .report_path(&report_path)
        .await
        .unwrap();

    let attempts = report.results.len() as u64;
    assert!(attempts >= 20, "only {attempts} attempts");
    assert_eq!(acquired.load(Ordering::SeqCst), attempts);
    assert_eq!(released.load(Ordering::SeqCst), attempts);
    assert_eq!(report.summary.total, attempts);
    assert_eq!(report.summary.successful + report.summary.failed, attempts);
    assert!(report
        .results
        .iter()
        .any(|o| o.failure_kind == Some(FailureKind::Timeout)));

    let records = read_records(&telemetry).unwrap();
    assert_eq!(records.len() as u64, attempts);
    assert!(records
        .iter()
        .filter(|r| r.outcome.exchange.is_some())
        .all(|r| r.sequence % 5 == 0));

    let errors = read_records(out.join("errors.ndjson")).unwrap();
    assert_eq!(errors.len() as u64, report.summary.failed);

    let csv = std::fs::read_to_string(out.join("telemetry.csv")).unwrap();
    assert_eq!(csv.lines().count() as u64, attempts + 1);

    let summary = report.telemetry.as_ref().unwrap();
    assert_eq!(summary.total, attempts);
    assert!(out.join("telemetry.summary.json").exists());
    let text = std::fs::read_to_string(out.join("telemetry.summary.txt")).unwrap();
    assert!(text.contains(&format!("Total Requests: {attempts}")));

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(saved["results"].as_array().unwrap().len() as u64, attempts);
    assert_eq!(saved["telemetryWriteFailures"], 0);
}
