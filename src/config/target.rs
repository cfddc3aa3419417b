use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::utils::path::get_host;
use crate::Error;
use crate::Result;

/// A managed device fronted by the gateway.
///
/// Read-mostly: the gateway holds the map of targets behind a shared lock and
/// request handlers clone the subset they dispatch to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TargetConfig {
    /// Symbolic name, back-filled from the map key when omitted
    #[serde(default)]
    pub name: String,

    /// Dial address, `host:port`
    pub address: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Dial without any transport security
    #[serde(default)]
    pub insecure: Option<bool>,

    /// Skip certificate verification when dialling with TLS
    #[serde(default)]
    pub skip_verify: Option<bool>,

    /// Per-request deadline for south-side RPCs, seconds
    /// Default: 10
    #[serde(default = "default_timeout")]
    pub timeout_in_secs: u64,

    #[serde(default)]
    pub tls_ca: Option<String>,

    #[serde(default)]
    pub tls_cert: Option<String>,

    #[serde(default)]
    pub tls_key: Option<String>,

    /// Output names this target publishes to
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Subscription profile names collected from this target
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

impl TargetConfig {
    /// The address with its port stripped; this is what symbolic target
    /// tokens are matched against.
    pub fn host(&self) -> &str {
        get_host(&self.address)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::Config(ConfigError::Message(format!(
                "target {:?} has no address",
                self.name
            ))));
        }
        if self.timeout_in_secs == 0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "target {:?} timeout must be greater than 0",
                self.name
            ))));
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    10
}
