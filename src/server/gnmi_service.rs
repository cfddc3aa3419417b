//! tonic service implementation: request demux and status mapping.

use std::pin::Pin;
use std::sync::Arc;

use autometrics::autometrics;
use futures::Stream;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tonic::Streaming;
use tracing::info;

use crate::constants::PROTOCOL_VERSION;
use crate::proto::gnmi::gnmi_server::Gnmi;
use crate::proto::gnmi::CapabilityRequest;
use crate::proto::gnmi::CapabilityResponse;
use crate::proto::gnmi::Encoding;
use crate::proto::gnmi::GetRequest;
use crate::proto::gnmi::GetResponse;
use crate::proto::gnmi::SetRequest;
use crate::proto::gnmi::SetResponse;
use crate::proto::gnmi::SubscribeRequest;
use crate::proto::gnmi::SubscribeResponse;
use crate::API_SLO;

use super::Gateway;

pub struct GnmiService {
    gateway: Arc<Gateway>,
}

impl GnmiService {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

fn prefix_target(prefix: Option<&crate::proto::gnmi::Path>) -> &str {
    prefix.map(|p| p.target.as_str()).unwrap_or("")
}

#[tonic::async_trait]
impl Gnmi for GnmiService {
    #[autometrics(objective = API_SLO)]
    async fn capabilities(
        &self,
        _request: Request<CapabilityRequest>,
    ) -> std::result::Result<Response<CapabilityResponse>, Status> {
        Ok(Response::new(CapabilityResponse {
            supported_models: vec![],
            supported_encodings: vec![
                Encoding::Json as i32,
                Encoding::JsonIetf as i32,
                Encoding::Bytes as i32,
                Encoding::Ascii as i32,
            ],
            gnmi_version: PROTOCOL_VERSION.to_string(),
        }))
    }

    #[autometrics(objective = API_SLO)]
    async fn get(
        &self,
        request: Request<GetRequest>,
    ) -> std::result::Result<Response<GetResponse>, Status> {
        let peer = request.remote_addr();
        let request = request.into_inner();
        info!(
            ?peer,
            target_name = prefix_target(request.prefix.as_ref()),
            "received Get request"
        );

        let response = self.gateway.dispatch_get(request).await?;
        Ok(Response::new(response))
    }

    #[autometrics(objective = API_SLO)]
    async fn set(
        &self,
        request: Request<SetRequest>,
    ) -> std::result::Result<Response<SetResponse>, Status> {
        let peer = request.remote_addr();
        let request = request.into_inner();
        info!(
            ?peer,
            target_name = prefix_target(request.prefix.as_ref()),
            "received Set request"
        );

        let response = self.gateway.dispatch_set(request).await?;
        Ok(Response::new(response))
    }

    type SubscribeStream =
        Pin<Box<dyn Stream<Item = std::result::Result<SubscribeResponse, Status>> + Send>>;

    #[autometrics(objective = API_SLO)]
    async fn subscribe(
        &self,
        request: Request<Streaming<SubscribeRequest>>,
    ) -> std::result::Result<Response<Self::SubscribeStream>, Status> {
        let peer = request.remote_addr();
        info!(?peer, "received a subscribe request");

        let stream = self.gateway.subscribe_stream(request.into_inner()).await?;
        Ok(Response::new(Box::pin(stream) as Self::SubscribeStream))
    }
}
