use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub const MOCK_ADDR: &str = "127.0.0.1:3003";

#[allow(unused)]
pub fn mock_url(path: &str) -> String {
    format!("http://{MOCK_ADDR}{path}")
}

#[allow(unused)]
pub async fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    let wait = ONCE_LOCK.get().is_none();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("volley=debug,mock_service=debug,axum::rejection=trace")
            .init();

        PrometheusBuilder::new()
            .with_http_listener("127.0.0.1:8003".parse::<SocketAddr>().unwrap())
            .install()
            .unwrap();

        // Outlives the runtime of whichever test gets here first.
        std::thread::spawn(|| {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let addr: SocketAddr = MOCK_ADDR.parse().unwrap();
            if let Err(err) = runtime.block_on(mock_service::run(addr)) {
                error!("Mock service stopped: {err}");
            }
        });
    });

    if wait {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
