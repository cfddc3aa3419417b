//! North-side RPC plane: gateway state, listener bring-up and TLS assembly.
//!
//! The listener address is either `host:port` or `unix:///path`; binding
//! retries forever with a one-second backoff. TLS follows from the
//! configured options: a certificate/key pair when both files are given, a
//! generated self-signed identity when only `skip_verify` or a CA is set,
//! plaintext when nothing TLS-related is configured.

mod admission;
mod gnmi_service;
mod internal;
mod registry;
mod subscribe;
mod unary;

pub use gnmi_service::GnmiService;


use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use rcgen::generate_simple_self_signed;
use rcgen::CertifiedKey;
use tokio::net::TcpListener;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Certificate;
use tonic::transport::Identity;
use tonic::transport::Server;
use tonic::transport::ServerTlsConfig;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::cache::Cache;
use crate::cache::MatchIndex;
use crate::client::GrpcSouthClientFactory;
use crate::client::SouthClientFactory;
use crate::config::GatewayConfig;
use crate::config::ServerConfig;
use crate::constants::LISTENER_RETRY_DELAY;
use crate::proto::gnmi::gnmi_server::GnmiServer;
use crate::NetworkError;
use crate::Result;

use admission::AdmissionLimiter;

/// Shared state of the RPC plane.
pub struct Gateway {
    pub(crate) config: Arc<RwLock<GatewayConfig>>,
    pub(crate) cache: Arc<Cache>,
    pub(crate) match_index: Arc<MatchIndex>,
    pub(crate) admission: AdmissionLimiter,
    pub(crate) south: Arc<dyn SouthClientFactory>,
    pub(crate) metrics_enabled: bool,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Arc<Self> {
        Self::with_south_factory(config, Arc::new(GrpcSouthClientFactory))
    }

    /// Builds the gateway around an injected south-side factory.
    pub fn with_south_factory(
        config: GatewayConfig,
        south: Arc<dyn SouthClientFactory>,
    ) -> Arc<Self> {
        let cache = Arc::new(Cache::new());
        for name in config.targets.keys() {
            cache.add_target(name.clone());
        }

        let match_index = Arc::new(MatchIndex::new());
        let hook_index = Arc::clone(&match_index);
        cache.set_client(move |leaf| hook_index.update(leaf, &leaf.match_path()));

        let admission =
            AdmissionLimiter::new(config.server.max_unary_rpc, config.server.max_subscriptions);
        let metrics_enabled = config.server.enable_metrics;

        Arc::new(Self {
            config: Arc::new(RwLock::new(config)),
            cache,
            match_index,
            admission,
            south,
            metrics_enabled,
        })
    }

    /// The coalesced cache this gateway serves subscriptions from. The
    /// south-side collector feeds it through [`Cache::update`].
    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Brings the listener up (retrying on bind failures) and serves RPCs
    /// until the shutdown signal fires.
    pub async fn start(self: Arc<Self>, mut shutdown: watch::Receiver<()>) -> Result<()> {
        let server_config = self.config.read().server.clone();
        let tls = build_tls_config(&server_config)?;
        let service = GnmiServer::new(GnmiService::new(Arc::clone(&self)));

        let mut builder = Server::builder();
        if let Some(tls) = tls {
            builder = builder.tls_config(tls)?;
            info!("gRPC TLS enabled");
        }

        let address = server_config.address.clone();
        let shutdown_signal = shutdown.changed().map(move |_| {
            warn!(%address, "stopping RPC server");
        });

        match parse_listen_address(&server_config.address) {
            ListenAddress::Tcp(address) => {
                let listener = loop {
                    match TcpListener::bind(&address).await {
                        Ok(listener) => break listener,
                        Err(e) => {
                            error!(error = %e, "failed to start gRPC server listener");
                            tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                        }
                    }
                };
                info!(%address, "gNMI server listening");
                builder
                    .add_service(service)
                    .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal)
                    .await?;
            }
            ListenAddress::Unix(path) => {
                let listener = loop {
                    match UnixListener::bind(&path) {
                        Ok(listener) => break listener,
                        Err(e) => {
                            error!(error = %e, "failed to start gRPC server listener");
                            tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                        }
                    }
                };
                info!(socket = %path, "gNMI server listening");
                builder
                    .add_service(service)
                    .serve_with_incoming_shutdown(
                        UnixListenerStream::new(listener),
                        shutdown_signal,
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

pub(crate) enum ListenAddress {
    Tcp(String),
    Unix(String),
}

pub(crate) fn parse_listen_address(address: &str) -> ListenAddress {
    match address.strip_prefix("unix://") {
        Some(path) => ListenAddress::Unix(path.to_string()),
        None => ListenAddress::Tcp(address.to_string()),
    }
}

/// Assembles the server TLS options, or `None` for plaintext.
pub(crate) fn build_tls_config(config: &ServerConfig) -> Result<Option<ServerTlsConfig>> {
    if !config.tls_requested() {
        return Ok(None);
    }

    let identity = if !config.cert_file.is_empty() && !config.key_file.is_empty() {
        let cert = std::fs::read_to_string(&config.cert_file)?;
        let key = std::fs::read_to_string(&config.key_file)?;
        Identity::from_pem(cert, key)
    } else {
        self_signed_identity()?
    };

    let mut tls = ServerTlsConfig::new().identity(identity);
    if !config.ca_file.is_empty() {
        let pem = std::fs::read_to_string(&config.ca_file)?;
        if !pem.contains("BEGIN CERTIFICATE") {
            return Err(NetworkError::InvalidPem {
                path: config.ca_file.clone().into(),
            }
            .into());
        }
        tls = tls.client_ca_root(Certificate::from_pem(pem));
    }
    Ok(Some(tls))
}

fn self_signed_identity() -> Result<Identity> {
    let subject_alt_names = vec!["localhost".to_string()];
    let CertifiedKey { cert, key_pair } = generate_simple_self_signed(subject_alt_names)
        .map_err(|e| NetworkError::CertGeneration(e.to_string()))?;
    Ok(Identity::from_pem(cert.pem(), key_pair.serialize_pem()))
}
