//! Unary Get/Set fan-out.
//!
//! Both operations share one skeleton: admission, validation, target
//! selection, one task per target streaming its responses into a merge
//! channel, and an aggregator collecting them. Per-target failures are
//! gathered and the first one fails the whole RPC; no partial result is
//! returned. Unary RPCs bypass the cache entirely.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tonic::Status;
use tracing::warn;

use crate::client::SouthClientFactory;
use crate::config::TargetConfig;
use crate::constants::INTERNAL_ORIGIN;
use crate::metrics;
use crate::proto::gnmi::GetRequest;
use crate::proto::gnmi::GetResponse;
use crate::proto::gnmi::Notification;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::SetRequest;
use crate::proto::gnmi::SetResponse;
use crate::proto::gnmi::UpdateResult;
use crate::utils::time::now_nanos;
use crate::Error;
use crate::Result;

use super::Gateway;

impl Gateway {
    pub(crate) async fn dispatch_get(
        &self,
        request: GetRequest,
    ) -> std::result::Result<GetResponse, Status> {
        let _permit = self
            .admission
            .try_unary()
            .ok_or_else(|| Status::resource_exhausted("max number of unary RPC reached"))?;
        if self.metrics_enabled {
            metrics::UNARY_RPC_TOTAL.with_label_values(&["get"]).inc();
        }

        if request.path.is_empty() && request.prefix.is_none() {
            return Err(Status::invalid_argument("missing path"));
        }

        if request.path.iter().any(|p| p.origin == INTERNAL_ORIGIN) {
            if request.path.iter().any(|p| p.origin != INTERNAL_ORIGIN) {
                return Err(Status::invalid_argument(
                    "combining `gnmic` origin with other origin values is not supported",
                ));
            }
            return self.internal_get(&request).map_err(Status::from);
        }

        let target_spec = request
            .prefix
            .as_ref()
            .map(|p| p.target.clone())
            .unwrap_or_default();
        let targets = self.select_targets(&target_spec).map_err(Status::from)?;

        let (merge_tx, mut merge_rx) = mpsc::channel::<Notification>(targets.len());
        let aggregator = tokio::spawn(async move {
            let mut collected = Vec::new();
            while let Some(notification) = merge_rx.recv().await {
                collected.push(notification);
            }
            collected
        });

        let mut workers: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(targets.len());
        for (name, tc) in targets {
            let factory = Arc::clone(&self.south);
            let request = request.clone();
            let merge_tx = merge_tx.clone();
            workers.push(tokio::spawn(get_one_target(
                factory, name, tc, request, merge_tx,
            )));
        }
        drop(merge_tx);

        let first_error = join_workers(workers).await?;
        let notifications = aggregator
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        if let Some(error) = first_error {
            return Err(Status::internal(error.to_string()));
        }

        Ok(GetResponse {
            notification: notifications,
        })
    }

    pub(crate) async fn dispatch_set(
        &self,
        request: SetRequest,
    ) -> std::result::Result<SetResponse, Status> {
        let _permit = self
            .admission
            .try_unary()
            .ok_or_else(|| Status::resource_exhausted("max number of unary RPC reached"))?;
        if self.metrics_enabled {
            metrics::UNARY_RPC_TOTAL.with_label_values(&["set"]).inc();
        }

        if request.update.is_empty() && request.replace.is_empty() && request.delete.is_empty() {
            return Err(Status::invalid_argument(
                "missing update/replace/delete path(s)",
            ));
        }

        let target_spec = request
            .prefix
            .as_ref()
            .map(|p| p.target.clone())
            .unwrap_or_default();
        let targets = self.select_targets(&target_spec).map_err(Status::from)?;

        let (merge_tx, mut merge_rx) = mpsc::channel::<UpdateResult>(targets.len());
        let aggregator = tokio::spawn(async move {
            let mut collected = Vec::new();
            while let Some(result) = merge_rx.recv().await {
                collected.push(result);
            }
            collected
        });

        let mut workers: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(targets.len());
        for (name, tc) in targets {
            let factory = Arc::clone(&self.south);
            let request = request.clone();
            let merge_tx = merge_tx.clone();
            workers.push(tokio::spawn(set_one_target(
                factory, name, tc, request, merge_tx,
            )));
        }
        drop(merge_tx);

        let first_error = join_workers(workers).await?;
        let results = aggregator
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        if let Some(error) = first_error {
            return Err(Status::internal(error.to_string()));
        }

        Ok(SetResponse {
            prefix: None,
            response: results,
            timestamp: now_nanos(),
        })
    }
}

/// Awaits every fan-out worker and keeps the first failure.
async fn join_workers(
    workers: Vec<JoinHandle<Result<()>>>,
) -> std::result::Result<Option<Error>, Status> {
    let mut first_error = None;
    for worker in workers {
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(%error, "fan-out task failed");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
            Err(join_error) => return Err(Status::internal(join_error.to_string())),
        }
    }
    Ok(first_error)
}

/// Writes the task's target name into an absent or glob prefix target.
fn annotate_prefix(prefix: &mut Option<Path>, name: &str) {
    let prefix = prefix.get_or_insert_with(Path::default);
    if prefix.target.is_empty() || prefix.target == "*" {
        prefix.target = name.to_string();
    }
}

async fn get_one_target(
    factory: Arc<dyn SouthClientFactory>,
    name: String,
    tc: TargetConfig,
    mut request: GetRequest,
    merge_tx: mpsc::Sender<Notification>,
) -> Result<()> {
    let client = factory.new_client(&tc).map_err(|e| Error::South {
        target: name.clone(),
        message: e.to_string(),
    })?;
    annotate_prefix(&mut request.prefix, &name);

    let deadline = Duration::from_secs(tc.timeout_in_secs);
    let response = match timeout(deadline, client.get(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(error)) => {
            return Err(Error::South {
                target: name,
                message: error.to_string(),
            })
        }
        Err(_) => {
            return Err(Error::South {
                target: name,
                message: format!("rpc timeout after {deadline:?}"),
            })
        }
    };

    for mut notification in response.notification {
        let prefix = notification.prefix.get_or_insert_with(Path::default);
        if prefix.target.is_empty() {
            prefix.target = name.clone();
        }
        if merge_tx.send(notification).await.is_err() {
            break;
        }
    }
    Ok(())
}

async fn set_one_target(
    factory: Arc<dyn SouthClientFactory>,
    name: String,
    tc: TargetConfig,
    mut request: SetRequest,
    merge_tx: mpsc::Sender<UpdateResult>,
) -> Result<()> {
    let client = factory.new_client(&tc).map_err(|e| Error::South {
        target: name.clone(),
        message: e.to_string(),
    })?;
    annotate_prefix(&mut request.prefix, &name);

    let deadline = Duration::from_secs(tc.timeout_in_secs);
    let response = match timeout(deadline, client.set(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(error)) => {
            return Err(Error::South {
                target: name,
                message: error.to_string(),
            })
        }
        Err(_) => {
            return Err(Error::South {
                target: name,
                message: format!("rpc timeout after {deadline:?}"),
            })
        }
    };

    for mut result in response.response {
        match result.path.as_mut() {
            Some(path) if path.target.is_empty() => path.target = name.clone(),
            Some(_) => {}
            None => {
                result.path = Some(Path {
                    target: name.clone(),
                    ..Default::default()
                })
            }
        }
        if merge_tx.send(result).await.is_err() {
            break;
        }
    }
    Ok(())
}
