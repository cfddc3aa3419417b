//! Configuration management for the aggregating telemetry gateway.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod server;
mod subscription;
mod target;

pub use server::*;
pub use subscription::*;
pub use target::*;

#[cfg(test)]
mod config_test;

//---
use std::collections::BTreeMap;
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Main configuration container for the gateway.
///
/// Combines all sections with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    /// North-side RPC server settings
    pub server: ServerConfig,
    /// Managed targets, keyed by symbolic name
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
    /// Named subscription profiles exposed through the internal namespace
    #[serde(default)]
    pub subscriptions: BTreeMap<String, SubscriptionConfig>,
}

impl GatewayConfig {
    /// Creates a new configuration with hierarchical override support.
    ///
    /// Configuration sources are merged in the following order (later sources
    /// override earlier ones):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from the `CONFIG_PATH` environment variable
    /// 3. Environment variables with `GNMI_GATEWAY__` prefix (highest
    ///    priority)
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("GNMI_GATEWAY")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Back-fills the name of every target and subscription from its map key
    /// when the entry does not carry one explicitly.
    pub fn normalize(&mut self) {
        for (name, target) in self.targets.iter_mut() {
            if target.name.is_empty() {
                target.name = name.clone();
            }
        }
        for (name, subscription) in self.subscriptions.iter_mut() {
            if subscription.name.is_empty() {
                subscription.name = name.clone();
            }
        }
    }

    /// Validates cross-component configuration rules.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        for target in self.targets.values() {
            target.validate()?;
        }
        for subscription in self.subscriptions.values() {
            subscription.validate()?;
        }
        Ok(())
    }
}
