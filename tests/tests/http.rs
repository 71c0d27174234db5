mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use reqwest::Client;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::time::{Duration, Instant};
    use volley::prelude::*;
    use volley::{read_records, FailureKind, TimingBreakdown};

    /// Start page, then a JSON post. Each attempt gets its own client, like a fresh browser
    /// context.
    struct HttpFlow {
        post_path: String,
    }

    impl Scenario for HttpFlow {
        type Session = Client;
        type Error = reqwest::Error;

        async fn acquire(&self, ctx: &AttemptContext) -> Result<Client, reqwest::Error> {
            Client::builder().timeout(ctx.timeout).build()
        }

        async fn run(
            &self,
            client: &mut Client,
            ctx: &AttemptContext,
        ) -> Result<ScenarioReport, reqwest::Error> {
            client.get(mock_url("/")).send().await?.error_for_status()?;

            let url = mock_url(&self.post_path);
            let body = json!({ "attempt": ctx.attempt_id, "delayMs": 20 });
            let started = Instant::now();
            let res = client.post(&url).json(&body).send().await?;

            let status = res.status().as_u16();
            let response_headers = res
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect();
            let response_body = res.json::<Value>().await.ok();

            let exchange = Exchange {
                method: "POST".to_string(),
                url,
                request_headers: BTreeMap::from([(
                    "content-type".to_string(),
                    "application/json".to_string(),
                )]),
                request_body: Some(body),
                status: Some(status),
                response_headers,
                response_body,
                timings: Some(TimingBreakdown {
                    total_ms: started.elapsed().as_secs_f64() * 1_000.,
                    ..Default::default()
                }),
            };

            Ok(ScenarioReport::expect_status(status, 200).exchange(exchange))
        }

        async fn release(&self, _client: Client) {}
    }

    fn config(duration: Duration) -> TestConfig {
        TestConfig::default()
            .concurrency(3)
            .duration(duration)
            .ramp_up(Duration::from_millis(300))
            .scenario_timeout(Duration::from_millis(1_000))
            .iteration_delay(Duration::from_millis(100))
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn http_flow_under_load() {
        init().await;
        let dir = tempfile::tempdir().unwrap();
        let telemetry = dir.path().join("telemetry.ndjson");

        let report = LoadTest::new(
            HttpFlow {
                post_path: "/loadSim".to_string(),
            },
            config(Duration::from_secs(2)),
        )
        .recorder(TelemetryRecorder::create(&telemetry).unwrap())
        .await
        .unwrap();

        assert!(report.results.len() >= 3);
        assert_eq!(report.summary.failed, 0, "{:?}", report.results);
        assert!(report.summary.p50_ms >= 20.);

        let records = read_records(&telemetry).unwrap();
        assert_eq!(records.len(), report.results.len());
        let exchange = records[0].outcome.exchange.as_ref().unwrap();
        assert_eq!(exchange.status, Some(200));
        assert_eq!(
            exchange.response_body.as_ref().unwrap()["received"]["attempt"],
            Value::from(records[0].outcome.attempt_id.clone())
        );
        assert!(report.results.iter().all(|o| o.exchange.is_none()));
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn unexpected_status_is_a_failure() {
        init().await;
        let scenario = scenario_fn(|_ctx| async move {
            let res = reqwest::get(mock_url("/status/503/delay/ms/10")).await?;
            Ok::<_, reqwest::Error>(ScenarioReport::expect_status(res.status().as_u16(), 200))
        });

        let report = LoadTest::new(scenario, config(Duration::from_secs(1)))
            .await
            .unwrap();

        assert!(!report.results.is_empty());
        for outcome in &report.results {
            assert!(!outcome.success);
            assert_eq!(outcome.status_code, Some(503));
            assert_eq!(outcome.failure_kind, Some(FailureKind::Rejected));
        }
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn slow_target_times_out() {
        init().await;
        let scenario = scenario_fn(|_ctx| async move {
            let res = reqwest::get(mock_url("/delay/ms/5000")).await?;
            Ok::<_, reqwest::Error>(ScenarioReport::expect_status(res.status().as_u16(), 200))
        });

        let started = Instant::now();
        let report = LoadTest::new(
            scenario,
            config(Duration::from_secs(1)).scenario_timeout(Duration::from_millis(300)),
        )
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(report.results.iter().all(|o| o.is_timeout()));
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn rate_limited_target_reports_both() {
        init().await;
        let scenario = scenario_fn(|_ctx| async move {
            let res = reqwest::get(mock_url("/max/5/delay/ms/1/scenario/rate_limited")).await?;
            Ok::<_, reqwest::Error>(ScenarioReport::expect_status(res.status().as_u16(), 200))
        });

        let report = LoadTest::new(
            scenario,
            config(Duration::from_secs(2)).iteration_delay(Duration::from_millis(10)),
        )
        .await
        .unwrap();

        assert!(report.summary.successful >= 1);
        assert!(report.summary.failed >= 1);
        assert!(report
            .results
            .iter()
            .filter(|o| !o.success)
            .all(|o| o.status_code == Some(503)));
    }
}
