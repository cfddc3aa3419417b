use std::path::Path;
use std::path::PathBuf;

use gnmi_gateway::config::GatewayConfig;
use gnmi_gateway::metrics;
use gnmi_gateway::server::Gateway;
use gnmi_gateway::utils::file_io;
use gnmi_gateway::Result;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = GatewayConfig::new()?;

    // Initializing Logs
    let _guard = init_observability(&settings.server.log_dir)?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    if settings.server.enable_metrics {
        let metrics_port = settings.server.metrics_port;
        tokio::spawn(metrics::start_server(metrics_port, graceful_rx.clone()));
    }

    let gateway = Gateway::new(settings);

    info!("gateway started, waiting for CTRL+C signal");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = gateway.start(graceful_rx).await {
        error!("gateway stops: {:?}", e);
    }

    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx
        .send(())
        .map_err(|e| gnmi_gateway::Error::Internal(format!("failed to send shutdown signal: {e}")))?;

    info!("shutdown completed");
    Ok(())
}

fn init_observability(log_dir: &PathBuf) -> Result<WorkerGuard> {
    let log_file = file_io::open_file_for_append(Path::new(log_dir).join("gateway.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
