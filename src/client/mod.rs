//! South-side protocol clients used for unary Get/Set fan-out.
//!
//! Clients are short-lived: the dispatcher builds one per target per RPC,
//! over a lazily-connected channel, and applies the target's timeout around
//! each call. The subscription plane never dials south; the cache is fed
//! elsewhere.

use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::transport::Endpoint;

use crate::config::TargetConfig;
use crate::proto::gnmi::gnmi_client::GnmiClient;
use crate::proto::gnmi::GetRequest;
use crate::proto::gnmi::GetResponse;
use crate::proto::gnmi::SetRequest;
use crate::proto::gnmi::SetResponse;
use crate::Error;
use crate::NetworkError;
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SouthClient: Send + Sync {
    async fn get(&self, request: GetRequest) -> Result<GetResponse>;
    async fn set(&self, request: SetRequest) -> Result<SetResponse>;
}

/// Produces a protocol client for one target configuration.
#[cfg_attr(test, mockall::automock)]
pub trait SouthClientFactory: Send + Sync {
    fn new_client(&self, target: &TargetConfig) -> Result<Box<dyn SouthClient>>;
}

/// Factory backed by tonic channels.
#[derive(Default)]
pub struct GrpcSouthClientFactory;

impl SouthClientFactory for GrpcSouthClientFactory {
    fn new_client(&self, target: &TargetConfig) -> Result<Box<dyn SouthClient>> {
        let endpoint = Endpoint::try_from(format!("http://{}", target.address))
            .map_err(|_| NetworkError::InvalidAddress(target.address.clone()))?;
        let channel = endpoint.connect_lazy();
        Ok(Box::new(GrpcSouthClient::new(channel)))
    }
}

pub struct GrpcSouthClient {
    client: GnmiClient<Channel>,
}

impl GrpcSouthClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: GnmiClient::new(channel),
        }
    }
}

#[async_trait]
impl SouthClient for GrpcSouthClient {
    async fn get(&self, request: GetRequest) -> Result<GetResponse> {
        let mut client = self.client.clone();
        let response = client.get(request).await.map_err(Error::from)?;
        Ok(response.into_inner())
    }

    async fn set(&self, request: SetRequest) -> Result<SetResponse> {
        let mut client = self.client.clone();
        let response = client.set(request).await.map_err(Error::from)?;
        Ok(response.into_inner())
    }
}
