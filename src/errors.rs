//! Gateway Error Hierarchy
//!
//! Defines error types for the aggregating telemetry gateway, categorized by
//! protocol layer and operational concerns, plus the mapping to gRPC status
//! codes applied at the service boundary.

use std::path::PathBuf;

use config::ConfigError;
use tokio::task::JoinError;
use tonic::Status;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Infrastructure-level failures (listener, transport, TLS)
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Subscription stream failures
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Malformed request rejected before any dispatch
    #[error("{0}")]
    InvalidRequest(String),

    /// Symbolic target token resolved to nothing
    #[error("unknown target {0:?}")]
    TargetNotFound(String),

    /// A south-side dial or RPC failed against one target
    #[error("target {target:?} err: {message}")]
    South { target: String, message: String },

    /// Unexpected internal condition
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Listener or channel I/O failures
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// gRPC transport layer errors
    #[error(transparent)]
    Transport(#[from] Box<tonic::transport::Error>),

    /// gRPC status returned by a peer
    #[error(transparent)]
    Rpc(#[from] Box<tonic::Status>),

    /// Malformed bind or target addresses
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Certificate material that failed to parse at startup
    #[error("invalid PEM content in {path}")]
    InvalidPem { path: PathBuf },

    /// Self-signed certificate generation failures
    #[error("certificate generation failed: {0}")]
    CertGeneration(String),

    /// Background task failed
    #[error("background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// Send error on the north-side response stream
    #[error("failed to send subscribe response: {0}")]
    Send(String),

    /// Receive error on the north-side request stream
    #[error("failed to receive subscribe request: {0}")]
    Receive(String),

    /// Subscription list carried a mode the gateway does not recognize
    #[error("unrecognized subscription mode: {0}")]
    UnrecognizedMode(i32),
}

// ============== Conversion Implementations ============== //
impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        NetworkError::Transport(Box::new(err)).into()
    }
}

impl From<tonic::Status> for Error {
    fn from(err: tonic::Status) -> Self {
        NetworkError::Rpc(Box::new(err)).into()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Io(err).into()
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        NetworkError::TaskFailed(err).into()
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest(msg) => Status::invalid_argument(msg),
            Error::TargetNotFound(target) => {
                Status::not_found(format!("target {target:?} is not known"))
            }
            Error::South { .. } => Status::internal(err.to_string()),
            Error::Subscription(e) => Status::unknown(e.to_string()),
            other => Status::internal(other.to_string()),
        }
    }
}
