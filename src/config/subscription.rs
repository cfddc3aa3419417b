use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// A named subscription profile.
///
/// Profiles are referenced by target configurations and are exposed through
/// the internal `gnmic` namespace; the collector consuming them lives outside
/// the RPC plane.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubscriptionConfig {
    /// Symbolic name, back-filled from the map key when omitted
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub paths: Vec<String>,

    /// Subscription mode: "stream", "once" or "poll"
    /// Default: "stream"
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Stream sub-mode: "on-change", "sample" or "target-defined"
    #[serde(default)]
    pub stream_mode: Option<String>,

    #[serde(default)]
    pub sample_interval_in_secs: Option<u64>,

    #[serde(default)]
    pub heartbeat_interval_in_secs: Option<u64>,

    #[serde(default)]
    pub encoding: Option<String>,
}

impl SubscriptionConfig {
    pub fn validate(&self) -> Result<()> {
        match self.mode.as_str() {
            "stream" | "once" | "poll" => Ok(()),
            other => Err(Error::Config(ConfigError::Message(format!(
                "subscription {:?} has unknown mode {:?}",
                self.name, other
            )))),
        }
    }
}

fn default_mode() -> String {
    "stream".into()
}
