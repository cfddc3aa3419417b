//! Prometheus metrics for the RPC plane, exposed over a warp `/metrics`
//! endpoint when `server.enable_metrics` is set.

use autometrics::prometheus_exporter;
use lazy_static::lazy_static;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    pub static ref UNARY_RPC_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("unary_rpc_total", "Number of admitted unary RPCs"),
        &["method"]
    )
    .expect("metric can not be created");
    pub static ref SUBSCRIBE_RESPONSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "subscribe_responses_total",
            "Subscribe responses written to client streams"
        ),
        &["type"]
    )
    .expect("metric can not be created");
    pub static ref ACTIVE_SUBSCRIPTIONS: IntGauge = IntGauge::new(
        "active_subscriptions",
        "Currently active subscription streams"
    )
    .expect("metric can not be created");
    pub static ref CUSTOM_REGISTRY: Registry =
        Registry::new_custom(Some("gnmi_gateway".to_string()), None).unwrap();
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(UNARY_RPC_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SUBSCRIBE_RESPONSES_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ACTIVE_SUBSCRIPTIONS.clone()))
        .expect("collector can be registered");
}

/// Serves `/metrics` until the shutdown signal fires.
pub async fn start_server(port: u16, mut shutdown_signal: watch::Receiver<()>) {
    prometheus_exporter::init();
    register_custom_metrics(&CUSTOM_REGISTRY);

    let registry = CUSTOM_REGISTRY.clone();
    let metrics_route = warp::path!("metrics")
        .map(move || registry.clone())
        .and_then(metrics_handler);

    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler(registry: Registry) -> Result<impl Reply, Rejection> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        eprintln!("could not encode custom metrics: {}", e);
    };
    let mut body = String::from_utf8(buffer).unwrap_or_default();

    body.push_str(&prometheus_exporter::encode_http_response().into_body());
    Ok(body)
}
