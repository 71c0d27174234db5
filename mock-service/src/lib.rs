use axum::{
    debug_handler,
    extract::Path,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
use metrics::counter;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub fn router() -> Router {
    Router::new()
        .route("/", get(start_page))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code/delay/ms/:delay_ms", get(status))
        .route(
            "/max/:max_tps/delay/ms/:delay_ms/scenario/:scenario_name",
            get(max),
        )
        .route("/loadSim", post(load_sim))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router()).await?;
    Ok(())
}

#[debug_handler]
pub async fn start_page() -> Html<&'static str> {
    hit("start");
    Html(START_PAGE)
}

const START_PAGE: &str = r#"<!doctype html>
<html>
  <head><title>Load Simulation</title></head>
  <body>
    <h1>Load Simulation</h1>
    <button id="replay">Replay</button>
    <script>
      document.getElementById("replay").onclick = () =>
        fetch("/loadSim", {
          method: "POST",
          headers: { "content-type": "application/json" },
          body: JSON.stringify({ source: "replay" }),
        });
    </script>
  </body>
</html>
"#;

#[debug_handler]
pub async fn delay(Path(delay_ms): Path<u64>) {
    hit("delay");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[debug_handler]
pub async fn status(Path((code, delay_ms)): Path<(u16, u64)>) -> StatusCode {
    hit("status");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

lazy_static! {
    static ref MAX_MAP: Arc<RwLock<HashMap<String, DefaultDirectRateLimiter>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Succeeds up to `max_tps` per second per scenario name, 503 beyond that.
#[debug_handler]
pub async fn max(
    Path((max_tps, delay_ms, scenario_name)): Path<(u32, u64, String)>,
) -> Result<(), StatusCode> {
    hit("max");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    {
        let limiters = MAX_MAP.read().unwrap_or_else(|e| e.into_inner());
        if let Some(limiter) = limiters.get(&scenario_name) {
            return match limiter.check() {
                Ok(_) => Ok(()),
                Err(_) => {
                    debug!("Rate limit reached for {scenario_name}");
                    Err(StatusCode::SERVICE_UNAVAILABLE)
                }
            };
        }
    }

    let limiter = rate_limiter(max_tps).ok_or(StatusCode::BAD_REQUEST)?;
    let _ = limiter.check();
    MAX_MAP
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .insert(scenario_name, limiter);
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSimRequest {
    /// Fixed processing time. A normally distributed one around 50ms is used when absent.
    pub delay_ms: Option<u64>,
    /// Status to answer with, 200 when absent.
    pub status: Option<u16>,
    #[serde(flatten)]
    pub payload: HashMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSimResponse {
    pub request_id: u64,
    pub processing_ms: u64,
    pub received: HashMap<String, Value>,
}

#[debug_handler]
pub async fn load_sim(
    Json(request): Json<LoadSimRequest>,
) -> (StatusCode, Json<LoadSimResponse>) {
    hit("loadSim");
    let request_id = REQUEST_IDS.fetch_add(1, Ordering::Relaxed) + 1;

    let processing_ms = request.delay_ms.unwrap_or_else(|| {
        Normal::<f64>::new(50., 15.)
            .map(|normal| normal.sample(&mut rand::thread_rng()).max(1.) as u64)
            .unwrap_or(50)
    });
    tokio::time::sleep(Duration::from_millis(processing_ms)).await;

    let status = request
        .status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::OK);

    (
        status,
        Json(LoadSimResponse {
            request_id,
            processing_ms,
            received: request.payload,
        }),
    )
}

static REQUEST_IDS: AtomicU64 = AtomicU64::new(0);

/** Utils **/

pub fn rate_limiter(tps: u32) -> Option<DefaultDirectRateLimiter> {
    NonZeroU32::new(tps).map(|tps| RateLimiter::direct(Quota::per_second(tps)))
}

fn hit(endpoint: &'static str) {
    counter!("mock_service.requests", "endpoint" => endpoint).increment(1);
    TPS_MEASURE.fetch_add(1, Ordering::Relaxed);
}

/** TPS Printer **/

static TPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn tps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let transactions = TPS_MEASURE.swap(0, Ordering::Relaxed);
        if transactions > 0 {
            println!("{transactions} TPS");
        }
    }
}
