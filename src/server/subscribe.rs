//! Streaming subscription engine.
//!
//! A subscribe stream is driven by four cooperating tasks: a mode handler
//! (ONCE, POLL or STREAM) filling the per-stream coalesce queue, optional
//! periodic sample/heartbeat tickers, and a send loop draining the queue onto
//! the wire. All of them bind to the stream's cancellation token; teardown
//! cancels the tickers, removes match-index registrations most-recent-first,
//! closes the queue and releases the admission permit.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::debug;
use tracing::warn;

use crate::cache::CoalesceQueue;
use crate::cache::Leaf;
use crate::cache::MatchSubscriber;
use crate::cache::QueryHandle;
use crate::cache::QueueItem;
use crate::constants::DEFAULT_SAMPLE_INTERVAL;
use crate::constants::SUBSCRIPTION_ERR_CAPACITY;
use crate::constants::SUBSCRIPTION_RESPONSE_CAPACITY;
use crate::metrics;
use crate::proto::gnmi::subscribe_request::Request as SubRequest;
use crate::proto::gnmi::subscribe_response::Response as SubResponse;
use crate::proto::gnmi::subscription_list::Mode as ListMode;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::SubscribeRequest;
use crate::proto::gnmi::SubscribeResponse;
use crate::proto::gnmi::SubscriptionList;
use crate::proto::gnmi::SubscriptionMode;
use crate::utils::path::complete_path;
use crate::utils::path::to_strings;
use crate::utils::time::now_nanos;
use crate::Error;
use crate::Result;
use crate::SubscriptionError;

use super::Gateway;

type ResponseSender = mpsc::Sender<std::result::Result<SubscribeResponse, Status>>;

/// Per-stream state shared by the mode handler, the tickers and the send
/// loop.
#[derive(Clone)]
pub(crate) struct StreamClient {
    target: String,
    list: SubscriptionList,
    queue: Arc<CoalesceQueue>,
    cancel: CancellationToken,
    err_tx: mpsc::Sender<Error>,
}

impl StreamClient {
    fn report(&self, error: Error) {
        // the sink is bounded; a stream already failing three ways over
        // loses the extras
        let _ = self.err_tx.try_send(error);
    }
}

/// Feeds match-index deliveries into the stream's queue.
struct QueueSubscriber {
    queue: Arc<CoalesceQueue>,
}

impl MatchSubscriber for QueueSubscriber {
    fn on_update(&self, leaf: &Arc<Leaf>) {
        self.queue.insert(QueueItem::Update(Arc::clone(leaf)));
    }
}

impl Gateway {
    /// Validates the first request of a subscribe stream and spins up the
    /// tasks serving it. The returned stream ends when the subscription
    /// terminates; hard failures are reported as the final stream item.
    pub(crate) async fn subscribe_stream<S>(
        self: &Arc<Self>,
        mut inbound: S,
    ) -> std::result::Result<
        ReceiverStream<std::result::Result<SubscribeResponse, Status>>,
        Status,
    >
    where
        S: Stream<Item = std::result::Result<SubscribeRequest, Status>> + Send + Unpin + 'static,
    {
        let first = match inbound.next().await {
            None => {
                // client closed the stream before subscribing
                let (_tx, rx) = mpsc::channel(1);
                return Ok(ReceiverStream::new(rx));
            }
            Some(Err(status)) => return Err(status),
            Some(Ok(request)) => request,
        };
        let Some(SubRequest::Subscribe(mut list)) = first.request else {
            return Err(Status::invalid_argument(
                "the subscribe request must contain a subscription definition",
            ));
        };

        let prefix = list.prefix.get_or_insert_with(Path::default);
        if prefix.target.is_empty() {
            prefix.target = "*".to_string();
        }
        let target = prefix.target.clone();

        if !self.cache.has_target(&target) {
            return Err(Status::not_found(format!("target {target:?} not found")));
        }

        let mode = ListMode::try_from(list.mode).map_err(|_| {
            Status::invalid_argument(format!("unrecognized subscription mode: {}", list.mode))
        })?;

        let Some(permit) = self.admission.try_subscribe() else {
            return Err(Status::resource_exhausted(
                "could not acquire a subscription spot",
            ));
        };
        debug!(target_name = %target, ?mode, "acquired subscription spot");

        let queue = Arc::new(CoalesceQueue::new());
        let cancel = CancellationToken::new();
        let (err_tx, mut err_rx) = mpsc::channel::<Error>(SUBSCRIPTION_ERR_CAPACITY);
        let (response_tx, response_rx) = mpsc::channel(SUBSCRIPTION_RESPONSE_CAPACITY);

        let sc = StreamClient {
            target,
            list,
            queue,
            cancel: cancel.clone(),
            err_tx,
        };

        let handler = match mode {
            ListMode::Once => tokio::spawn(Arc::clone(self).handle_once(sc.clone())),
            ListMode::Poll => tokio::spawn(Arc::clone(self).handle_poll(inbound, sc.clone())),
            ListMode::Stream => tokio::spawn(Arc::clone(self).handle_stream(sc.clone())),
        };
        let mut sender = tokio::spawn(Arc::clone(self).send_loop(sc.clone(), response_tx.clone()));

        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            if gateway.metrics_enabled {
                metrics::ACTIVE_SUBSCRIPTIONS.inc();
            }

            tokio::select! {
                _ = &mut sender => {}
                // the client went away; unblock the send loop
                _ = response_tx.closed() => {
                    sc.queue.close();
                    let _ = (&mut sender).await;
                }
            }
            cancel.cancel();
            sc.queue.close();
            let _ = handler.await;
            drop(sc);

            let mut errors = Vec::new();
            while let Some(error) = err_rx.recv().await {
                errors.push(error);
            }
            if !errors.is_empty() {
                let mut message = String::from("multiple errors occurred:\n");
                for error in &errors {
                    message.push_str(&format!("- {error}\n"));
                }
                let _ = response_tx.send(Err(Status::unknown(message))).await;
            }
            if gateway.metrics_enabled {
                metrics::ACTIVE_SUBSCRIPTIONS.dec();
            }
            debug!("subscription terminated");
        });

        Ok(ReceiverStream::new(response_rx))
    }

    /// One snapshot pass: every subscription path queried against the cache,
    /// then a single sync marker. `updates_only` skips straight to the
    /// marker.
    fn once_pass(&self, sc: &StreamClient) -> Result<()> {
        if !sc.list.updates_only {
            for sub in &sc.list.subscription {
                let full_path = complete_path(sc.list.prefix.as_ref(), sub.path.as_ref());
                self.cache.query(&sc.target, &full_path, |_, leaf| {
                    sc.queue.insert(QueueItem::Update(Arc::clone(leaf)));
                    Ok(())
                })?;
            }
        }
        sc.queue.insert(QueueItem::Sync);
        Ok(())
    }

    async fn handle_once(self: Arc<Self>, sc: StreamClient) {
        if let Err(error) = self.once_pass(&sc) {
            warn!(target_name = %sc.target, %error, "failed internal cache query");
            sc.report(error);
        }
        sc.queue.close();
    }

    async fn handle_poll<S>(self: Arc<Self>, mut inbound: S, sc: StreamClient)
    where
        S: Stream<Item = std::result::Result<SubscribeRequest, Status>> + Send + Unpin + 'static,
    {
        if let Err(error) = self.once_pass(&sc) {
            sc.report(error);
            sc.queue.close();
            return;
        }
        loop {
            if sc.queue.is_closed() {
                return;
            }
            tokio::select! {
                _ = sc.cancel.cancelled() => return,
                message = inbound.next() => match message {
                    None => {
                        sc.queue.close();
                        return;
                    }
                    Some(Err(status)) => {
                        warn!(target_name = %sc.target, %status, "failed poll subscription rcv");
                        sc.report(SubscriptionError::Receive(status.to_string()).into());
                        sc.queue.close();
                        return;
                    }
                    Some(Ok(_poll)) => {
                        debug!(target_name = %sc.target, "repoll");
                        if let Err(error) = self.once_pass(&sc) {
                            sc.report(error);
                            sc.queue.close();
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_stream(self: Arc<Self>, sc: StreamClient) {
        let mut handles: Vec<QueryHandle> = Vec::new();

        for (i, sub) in sc.list.subscription.iter().enumerate() {
            let mode = match SubscriptionMode::try_from(sub.mode) {
                Ok(mode) => mode,
                Err(_) => {
                    sc.report(SubscriptionError::UnrecognizedMode(sub.mode).into());
                    sc.queue.close();
                    return;
                }
            };
            let full_path = complete_path(sc.list.prefix.as_ref(), sub.path.as_ref());
            debug!(target_name = %sc.target, item = i, ?mode, "handling subscription list item");

            match mode {
                SubscriptionMode::OnChange | SubscriptionMode::TargetDefined => {
                    if !sc.list.updates_only {
                        let snapshot = self.cache.query(&sc.target, &full_path, |_, leaf| {
                            sc.queue.insert(QueueItem::Update(Arc::clone(leaf)));
                            Ok(())
                        });
                        if let Err(error) = snapshot {
                            warn!(target_name = %sc.target, %error, "failed internal cache query");
                            sc.report(error);
                            sc.queue.close();
                            return;
                        }
                    }
                    if sub.heartbeat_interval > 0 {
                        if !sc.list.updates_only {
                            self.sampled_query(&sc, &full_path);
                        }
                        let period = Duration::from_nanos(sub.heartbeat_interval);
                        tokio::spawn(Arc::clone(&self).periodic_query(
                            sc.clone(),
                            period,
                            full_path.clone(),
                        ));
                    }
                    if sub.path.is_some() {
                        let mut pattern = to_strings(sc.list.prefix.as_ref(), true);
                        pattern.extend(to_strings(sub.path.as_ref(), false));
                        let subscriber = Arc::new(QueueSubscriber {
                            queue: Arc::clone(&sc.queue),
                        });
                        handles.push(self.match_index.add_query(pattern, subscriber));
                    }
                }
                SubscriptionMode::Sample => {
                    if !sc.list.updates_only {
                        self.sampled_query(&sc, &full_path);
                    }
                    let period = if sub.sample_interval > 0 {
                        Duration::from_nanos(sub.sample_interval)
                    } else {
                        DEFAULT_SAMPLE_INTERVAL
                    };
                    tokio::spawn(Arc::clone(&self).periodic_query(sc.clone(), period, full_path));
                }
            }
        }

        sc.queue.insert(QueueItem::Sync);
        sc.cancel.cancelled().await;

        // registrations removed most-recent-first
        while let Some(handle) = handles.pop() {
            handle.remove();
        }
    }

    /// Sample/heartbeat ticker: one sampled pass per period until the stream
    /// is cancelled. The immediate pass runs inline during wiring so the sync
    /// marker lands after every initial snapshot.
    async fn periodic_query(self: Arc<Self>, sc: StreamClient, period: Duration, full_path: Vec<String>) {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = sc.cancel.cancelled() => {
                    debug!(target_name = %sc.target, "periodic query stopped");
                    return;
                }
                _ = ticker.tick() => self.sampled_query(&sc, &full_path),
            }
        }
    }

    /// One sampled pass: matching leaves are cloned off the tree and
    /// re-stamped to the emission time.
    fn sampled_query(&self, sc: &StreamClient, full_path: &[String]) {
        let result = self.cache.query(&sc.target, full_path, |_, leaf| {
            let mut notification = leaf.notification().clone();
            notification.timestamp = now_nanos();
            sc.queue
                .insert(QueueItem::Update(Arc::new(leaf.detached(notification))));
            Ok(())
        });
        if let Err(error) = result {
            warn!(target_name = %sc.target, %error, "failed internal cache query");
        }
    }

    /// Drains the queue onto the wire until it closes.
    async fn send_loop(self: Arc<Self>, sc: StreamClient, response_tx: ResponseSender) {
        while let Some((item, dup)) = sc.queue.next().await {
            let (label, response) = match item {
                QueueItem::Sync => (
                    "sync",
                    SubscribeResponse {
                        response: Some(SubResponse::SyncResponse(true)),
                    },
                ),
                QueueItem::Update(leaf) => ("update", make_subscribe_response(&leaf, dup)),
            };
            if self.metrics_enabled {
                metrics::SUBSCRIBE_RESPONSES_TOTAL
                    .with_label_values(&[label])
                    .inc();
            }
            if response_tx.send(Ok(response)).await.is_err() {
                sc.report(SubscriptionError::Send("client stream closed".to_string()).into());
                return;
            }
        }
    }
}

fn make_subscribe_response(leaf: &Leaf, dup: u32) -> SubscribeResponse {
    let mut notification = leaf.notification().clone();
    if dup > 0 {
        for update in notification.update.iter_mut() {
            update.duplicates = dup;
        }
    }
    SubscribeResponse {
        response: Some(SubResponse::Update(notification)),
    }
}
