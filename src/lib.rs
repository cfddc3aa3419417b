//! # gnmi-gateway
//!
//! An aggregating telemetry gateway: a gRPC service terminating a streaming
//! network-management protocol (modelled on gNMI) northbound and multiplexing
//! to a fleet of managed targets southbound.
//!
//! ## Features
//! - **Unary fan-out**: `Get`/`Set` against one symbolic target name, a
//!   comma list of hosts or a glob, with per-target timeouts and merged
//!   responses
//! - **Streaming subscriptions**: ONCE, POLL and STREAM modes served from an
//!   in-memory coalesced cache, with ON_CHANGE, SAMPLE, TARGET_DEFINED and
//!   heartbeat policies
//! - **Self-description**: the reserved `gnmic` origin exposes the gateway's
//!   own target and subscription configuration
//! - **Load shedding**: counting semaphores cap concurrent unary RPCs and
//!   active subscriptions
//!
//! ## Quick Start
//! ```no_run
//! use gnmi_gateway::config::GatewayConfig;
//! use gnmi_gateway::server::Gateway;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = GatewayConfig::new().unwrap();
//!     let (_graceful_tx, graceful_rx) = watch::channel(());
//!
//!     let gateway = Gateway::new(settings);
//!     if let Err(e) = gateway.start(graceful_rx).await {
//!         eprintln!("gateway stopped: {e:?}");
//!     }
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod proto;
pub mod server;

mod constants;
mod errors;

pub use constants::INTERNAL_ORIGIN;
pub use errors::*;

pub mod metrics;
#[doc(hidden)]
pub mod utils;

//-----------------------------------------------------------
// Test utils
#[cfg(test)]
#[doc(hidden)]
pub(crate) mod test_utils;

//-----------------------------------------------------------
// Autometrics
/// autometrics: https://docs.autometrics.dev/rust/adding-alerts-and-slos
use autometrics::objectives::Objective;
use autometrics::objectives::ObjectiveLatency;
use autometrics::objectives::ObjectivePercentile;

#[doc(hidden)]
pub const API_SLO: Objective = Objective::new("api")
    .success_rate(ObjectivePercentile::P99_9)
    .latency(ObjectiveLatency::Ms100, ObjectivePercentile::P99);
