//! End-to-end tests driving the gateway over a real loopback gRPC
//! connection.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::Code;

use gnmi_gateway::client::SouthClient;
use gnmi_gateway::client::SouthClientFactory;
use gnmi_gateway::config::GatewayConfig;
use gnmi_gateway::config::TargetConfig;
use gnmi_gateway::proto::gnmi::gnmi_client::GnmiClient;
use gnmi_gateway::proto::gnmi::gnmi_server::GnmiServer;
use gnmi_gateway::proto::gnmi::subscribe_request::Request as SubRequest;
use gnmi_gateway::proto::gnmi::subscribe_response::Response as SubResponse;
use gnmi_gateway::proto::gnmi::subscription_list::Mode as ListMode;
use gnmi_gateway::proto::gnmi::typed_value::Value;
use gnmi_gateway::proto::gnmi::CapabilityRequest;
use gnmi_gateway::proto::gnmi::GetRequest;
use gnmi_gateway::proto::gnmi::GetResponse;
use gnmi_gateway::proto::gnmi::Notification;
use gnmi_gateway::proto::gnmi::Path;
use gnmi_gateway::proto::gnmi::PathElem;
use gnmi_gateway::proto::gnmi::SetRequest;
use gnmi_gateway::proto::gnmi::SetResponse;
use gnmi_gateway::proto::gnmi::SubscribeRequest;
use gnmi_gateway::proto::gnmi::Subscription;
use gnmi_gateway::proto::gnmi::SubscriptionList;
use gnmi_gateway::proto::gnmi::SubscriptionMode;
use gnmi_gateway::proto::gnmi::TypedValue;
use gnmi_gateway::proto::gnmi::Update;
use gnmi_gateway::server::Gateway;
use gnmi_gateway::server::GnmiService;
use gnmi_gateway::Error;
use gnmi_gateway::Result;

fn make_path(segments: &[&str]) -> Path {
    Path {
        origin: String::new(),
        target: String::new(),
        elem: segments
            .iter()
            .map(|s| PathElem {
                name: s.to_string(),
                key: BTreeMap::new(),
            })
            .collect(),
    }
}

fn int_notification(timestamp: i64, segments: &[&str], value: i64) -> Notification {
    Notification {
        timestamp,
        prefix: None,
        update: vec![Update {
            path: Some(make_path(segments)),
            val: Some(TypedValue {
                value: Some(Value::IntVal(value)),
            }),
            duplicates: 0,
        }],
        delete: vec![],
    }
}

/// South side answering every Get with a fixed notification.
struct StaticSouth {
    value: i64,
}

struct StaticSouthClient {
    value: i64,
}

#[async_trait]
impl SouthClient for StaticSouthClient {
    async fn get(&self, _request: GetRequest) -> Result<GetResponse> {
        Ok(GetResponse {
            notification: vec![int_notification(1, &["a", "b"], self.value)],
        })
    }

    async fn set(&self, _request: SetRequest) -> Result<SetResponse> {
        Err(Error::Internal("set is not wired in this fixture".into()))
    }
}

impl SouthClientFactory for StaticSouth {
    fn new_client(&self, _target: &TargetConfig) -> Result<Box<dyn SouthClient>> {
        Ok(Box::new(StaticSouthClient { value: self.value }))
    }
}

fn base_config(max_unary: usize) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.max_unary_rpc = max_unary;
    config.targets.insert(
        "r1".to_string(),
        TargetConfig {
            name: "r1".to_string(),
            address: "1.1.1.1:57400".to_string(),
            username: None,
            password: None,
            insecure: None,
            skip_verify: None,
            timeout_in_secs: 10,
            tls_ca: None,
            tls_cert: None,
            tls_key: None,
            outputs: vec![],
            subscriptions: vec![],
        },
    );
    config
}

/// Serves the gateway on an ephemeral loopback port and returns it with a
/// connected client.
async fn start_gateway(
    config: GatewayConfig,
    south: Arc<dyn SouthClientFactory>,
) -> (Arc<Gateway>, GnmiClient<tonic::transport::Channel>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address: SocketAddr = listener.local_addr().unwrap();

    let gateway = Gateway::with_south_factory(config, south);
    let service = GnmiServer::new(GnmiService::new(Arc::clone(&gateway)));
    tokio::spawn(async move {
        Server::builder()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    let endpoint = format!("http://{address}");
    let mut client = None;
    for _ in 0..50 {
        match GnmiClient::connect(endpoint.clone()).await {
            Ok(connected) => {
                client = Some(connected);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    (gateway, client.expect("server must come up"))
}

#[tokio::test]
async fn capabilities_should_report_supported_encodings() {
    let (_gateway, mut client) =
        start_gateway(base_config(64), Arc::new(StaticSouth { value: 0 })).await;

    let response = client
        .capabilities(CapabilityRequest {})
        .await
        .unwrap()
        .into_inner();

    assert!(!response.supported_encodings.is_empty());
    assert!(!response.gnmi_version.is_empty());
}

#[tokio::test]
async fn get_should_fan_out_over_the_wire() {
    let (_gateway, mut client) =
        start_gateway(base_config(64), Arc::new(StaticSouth { value: 42 })).await;

    let response = client
        .get(GetRequest {
            prefix: Some(Path {
                target: "r1".to_string(),
                ..Default::default()
            }),
            path: vec![make_path(&["a", "b"])],
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.notification.len(), 1);
    assert_eq!(
        response.notification[0].prefix.as_ref().unwrap().target,
        "r1"
    );
}

#[tokio::test]
async fn get_with_zero_budget_should_be_resource_exhausted_over_the_wire() {
    let (_gateway, mut client) =
        start_gateway(base_config(0), Arc::new(StaticSouth { value: 0 })).await;

    let status = client
        .get(GetRequest {
            prefix: Some(Path {
                target: "r1".to_string(),
                ..Default::default()
            }),
            path: vec![make_path(&["a"])],
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::ResourceExhausted);
}

#[tokio::test]
async fn subscribe_once_should_stream_snapshot_and_sync() {
    let (gateway, mut client) =
        start_gateway(base_config(64), Arc::new(StaticSouth { value: 0 })).await;
    gateway
        .cache()
        .update("r1", int_notification(1, &["a", "b"], 7))
        .unwrap();

    let request = SubscribeRequest {
        request: Some(SubRequest::Subscribe(SubscriptionList {
            prefix: Some(Path {
                target: "r1".to_string(),
                ..Default::default()
            }),
            subscription: vec![Subscription {
                path: Some(make_path(&["a", "b"])),
                mode: SubscriptionMode::OnChange as i32,
                sample_interval: 0,
                suppress_redundant: false,
                heartbeat_interval: 0,
            }],
            mode: ListMode::Once as i32,
            encoding: 0,
            updates_only: false,
        })),
    };

    let outbound = tokio_stream::iter(vec![request]);
    let mut inbound = client.subscribe(outbound).await.unwrap().into_inner();

    let first = inbound.message().await.unwrap().unwrap();
    match first.response {
        Some(SubResponse::Update(notification)) => {
            assert_eq!(notification.update.len(), 1);
        }
        other => panic!("expected a data response, got {other:?}"),
    }

    let second = inbound.message().await.unwrap().unwrap();
    assert!(matches!(
        second.response,
        Some(SubResponse::SyncResponse(true))
    ));

    assert!(inbound.message().await.unwrap().is_none());
}
