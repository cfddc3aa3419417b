use std::time::Duration;

/// Reserved path origin through which the gateway exposes its own
/// configuration instead of forwarding to a south target.
pub const INTERNAL_ORIGIN: &str = "gnmic";

/// Protocol version reported by `Capabilities`.
pub(crate) const PROTOCOL_VERSION: &str = "0.8.2";

/// Fallback period for SAMPLE subscriptions that request an interval of 0.
pub(crate) const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

/// Delay between listener bind attempts during server bring-up.
pub(crate) const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Capacity of the per-subscription error sink.
pub(crate) const SUBSCRIPTION_ERR_CAPACITY: usize = 3;

/// Capacity of the per-subscription response channel feeding the wire.
pub(crate) const SUBSCRIPTION_RESPONSE_CAPACITY: usize = 16;
