use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// North-side RPC server configuration.
///
/// TLS behavior follows from which of the certificate options are set: a
/// certificate/key pair is loaded when both paths are present, a self-signed
/// certificate is generated when only `skip_verify` or `ca_file` is set, and
/// the server runs in plaintext when none of the TLS options is set.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address, either `host:port` or `unix:///path/to/socket`
    /// Default: "0.0.0.0:57400"
    #[serde(default = "default_address")]
    pub address: String,

    /// Capacity of the subscribe-admission semaphore
    /// Default: 64
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions: usize,

    /// Capacity of the unary-admission semaphore
    /// Default: 64
    #[serde(default = "default_max_unary_rpc")]
    pub max_unary_rpc: usize,

    /// Enables the Prometheus stream/unary counters and the /metrics endpoint
    /// Default: false
    #[serde(default)]
    pub enable_metrics: bool,

    /// Port the /metrics endpoint binds to when metrics are enabled
    /// Default: 9804
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Skip client certificate verification
    /// Default: false
    #[serde(default)]
    pub skip_verify: bool,

    /// CA certificate appended as a client root, PEM format
    #[serde(default)]
    pub ca_file: String,

    /// Server certificate chain path, PEM format
    #[serde(default)]
    pub cert_file: String,

    /// Server private key path, PEM format
    #[serde(default)]
    pub key_file: String,

    /// Directory receiving the gateway log file
    /// Default: "./logs"
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            max_subscriptions: default_max_subscriptions(),
            max_unary_rpc: default_max_unary_rpc(),
            enable_metrics: false,
            metrics_port: default_metrics_port(),
            skip_verify: false,
            ca_file: String::new(),
            cert_file: String::new(),
            key_file: String::new(),
            log_dir: default_log_dir(),
        }
    }
}

impl ServerConfig {
    /// True when any of the TLS options is set, i.e. the listener must not
    /// run in plaintext.
    pub fn tls_requested(&self) -> bool {
        self.skip_verify
            || !self.ca_file.is_empty()
            || (!self.cert_file.is_empty() && !self.key_file.is_empty())
    }

    /// Validates server configuration consistency.
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "Server address must not be empty".into(),
            )));
        }

        if self.cert_file.is_empty() != self.key_file.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "cert_file and key_file must be provided together".into(),
            )));
        }

        Ok(())
    }
}

// Default implementations
fn default_address() -> String {
    "0.0.0.0:57400".into()
}
fn default_max_subscriptions() -> usize {
    64
}
fn default_max_unary_rpc() -> usize {
    64
}
fn default_metrics_port() -> u16 {
    9804
}
fn default_log_dir() -> PathBuf {
    "./logs".into()
}
