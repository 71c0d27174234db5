use anyhow::Context;
use clap::Parser;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use volley::prelude::*;
use volley::TimingBreakdown;

/// Drive virtual users through a start page and a JSON post.
#[derive(Parser, Debug)]
#[command(version = "0.1")]
struct Cli {
    /// Number of virtual users
    #[arg(default_value_t = 10)]
    concurrency: usize,

    /// Test duration in seconds
    #[arg(default_value_t = 60.)]
    duration: f64,

    /// Ramp-up in seconds
    #[arg(default_value_t = 5.)]
    ramp_up: f64,

    #[arg(default_value_t = true, action = clap::ArgAction::Set)]
    headless: bool,

    /// Base URL of the target
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Per-attempt timeout, e.g. `30s` or `500ms`
    #[arg(short, long, value_parser = humantime::parse_duration, default_value = "30s")]
    timeout: Duration,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "1s")]
    iteration_delay: Duration,

    /// Keep the full request/response only for every n-th record
    #[arg(long)]
    sample_every: Option<NonZeroU64>,

    /// Parent of the per-run output directory
    #[arg(short, long, default_value = "load-test-results")]
    output_dir: PathBuf,

    /// Log snapshots instead of drawing the live panel
    #[arg(long)]
    no_console: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("volley=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = TestConfig::from_numbers(
        cli.concurrency,
        cli.duration,
        cli.ramp_up,
        cli.timeout.as_secs_f64() * 1_000.,
        cli.headless,
    )?
    .iteration_delay(cli.iteration_delay);
    if let Some(n) = cli.sample_every {
        config = config.sample_policy(SamplePolicy::EveryNth(n));
    }

    let run_dir = cli.output_dir.join(run_dir_name(OffsetDateTime::now_utc()));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating {}", run_dir.display()))?;

    let recorder = TelemetryRecorder::create(run_dir.join("telemetry.ndjson"))?
        .with_csv(run_dir.join("request-summary.csv"))?
        .with_error_stream(run_dir.join("errors.ndjson"))?;

    let scenario = HttpFlow {
        base: cli.url.trim_end_matches('/').to_string(),
    };
    let test = LoadTest::new(scenario, config)
        .recorder(recorder)
        .report_path(run_dir.join("load-test-report.json"));

    let report = if cli.no_console {
        test.observer(TracingObserver).await?
    } else {
        test.observer(ConsoleRenderer::stdout()).await?
    };

    info!("{}", report.summary);
    println!("Results written to {}", run_dir.display());
    Ok(())
}

fn run_dir_name(now: OffsetDateTime) -> String {
    let stamp = now
        .format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("run-{}", stamp.replace([':', '.'], "-"))
}

/// Load the start page, then post to `/loadSim` and expect a 200.
struct HttpFlow {
    base: String,
}

impl Scenario for HttpFlow {
    /// Fresh client per attempt, so no connection or cookie state is shared between attempts.
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
        client
            .get(format!("{}/", self.base))
            .send()
            .await?
            .error_for_status()?;

        let url = format!("{}/loadSim", self.base);
        let body = json!({ "attemptId": ctx.attempt_id, "userId": ctx.user_id });

        let started = Instant::now();
        let res = client.post(&url).json(&body).send().await?;
        let first_byte = started.elapsed();

        let status = res.status().as_u16();
        let response_headers: BTreeMap<String, String> = res
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let response_body = res.json::<Value>().await.ok();
        let total = started.elapsed();

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
                first_byte_ms: Some(millis(first_byte)),
                download_ms: Some(millis(total - first_byte)),
                total_ms: millis(total),
                ..Default::default()
            }),
        };

        Ok(ScenarioReport::expect_status(status, 200).exchange(exchange))
    }

    async fn release(&self, _client: Client) {}
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.
}
