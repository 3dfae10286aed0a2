use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::Bytes;
use camlink_frame::message::GET_STATUS_VALUES;
use camlink_frame::{fragment_message, MessageKind, RawMessage, Reassembler};
use camlink_registry::{Domain, IdRegistry, ParsedEnvelope};
use camlink_transport::{HttpChannel, NotificationStream, WirelessTransport};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace, warn};

use crate::config::ClientConfig;
use crate::correlator::{Channel, Correlator};
use crate::error::{ClientError, Result};
use crate::http::normalize_reply;
use crate::lifecycle::{ConnectionState, Lifecycle};
use crate::subscriptions::{Subscriber, SubscriptionRegistry};

/// State shared between the communicator and its background tasks.
struct Shared {
    correlator: Correlator,
    subscriptions: SubscriptionRegistry,
    lifecycle: Lifecycle,
    registry: Arc<IdRegistry>,
}

impl Shared {
    /// Disconnect consequences, exactly once per connection: fail every
    /// pending request, then stop the background tasks.
    fn on_disconnect(&self, cancel: &CancellationToken) {
        if self.lifecycle.set_closed() {
            self.correlator.fail_all();
        }
        cancel.cancel();
    }

    /// Route one decoded wireless message by kind.
    fn route_message(&self, raw: &RawMessage) {
        let envelope = self.registry.decode(raw);

        // Baseline statuses drive readiness whether they arrive as pushes
        // or as explicit query responses.
        if matches!(
            envelope.kind,
            MessageKind::StatusPush | MessageKind::StatusResponse
        ) {
            for (id, value) in &envelope.values {
                self.lifecycle.observe_status(*id, value);
            }
        }

        if envelope.kind.is_push() {
            self.subscriptions.dispatch(&envelope);
        } else {
            self.correlator.deliver(Channel::Wireless, envelope);
        }
    }
}

/// The protocol communicator: one camera, two channels.
///
/// Constructed over injected transport capabilities and an immutable
/// identifier registry. `open` connects and starts the background receive
/// and keep-alive tasks; `send` issues correlated commands on either
/// channel; `register` subscribes to asynchronous pushes. All methods take
/// `&self`, so the communicator can be shared (e.g. in an `Arc`) while
/// commands are in flight.
pub struct Communicator<W, H> {
    wireless: Arc<W>,
    http: Arc<H>,
    config: ClientConfig,
    shared: Arc<Shared>,
    wireless_lock: Arc<AsyncMutex<()>>,
    http_lock: Arc<AsyncMutex<()>>,
    cancel: StdMutex<CancellationToken>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl<W, H> Communicator<W, H>
where
    W: WirelessTransport + 'static,
    H: HttpChannel + 'static,
{
    pub fn new(wireless: W, http: H, registry: Arc<IdRegistry>) -> Self {
        Self::with_config(wireless, http, registry, ClientConfig::default())
    }

    pub fn with_config(
        wireless: W,
        http: H,
        registry: Arc<IdRegistry>,
        config: ClientConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            correlator: Correlator::new(),
            subscriptions: SubscriptionRegistry::new(),
            lifecycle: Lifecycle::new(config.required_statuses.clone()),
            registry,
        });
        Self {
            wireless: Arc::new(wireless),
            http: Arc::new(http),
            config,
            shared,
            wireless_lock: Arc::new(AsyncMutex::new(())),
            http_lock: Arc::new(AsyncMutex::new(())),
            cancel: StdMutex::new(CancellationToken::new()),
            tasks: StdMutex::new(Vec::new()),
        }
    }

    /// Connect the wireless transport and start the receive and keep-alive
    /// tasks. A no-op if already open.
    pub async fn open(&self) -> Result<()> {
        if self.shared.lifecycle.state() != ConnectionState::Closed {
            return Ok(());
        }

        let notifications = self.wireless.open().await?;

        let cancel = CancellationToken::new();
        let mut tasks = self.tasks.lock().unwrap();
        for stale in tasks.drain(..) {
            stale.abort();
        }
        *self.cancel.lock().unwrap() = cancel.clone();
        self.shared.lifecycle.set_open();

        tasks.push(tokio::spawn(run_rx_loop(
            notifications,
            Arc::clone(&self.shared),
            cancel.clone(),
        )));
        tasks.push(tokio::spawn(run_keep_alive(
            Arc::clone(&self.wireless),
            Arc::clone(&self.shared),
            Arc::clone(&self.wireless_lock),
            self.config.clone(),
            cancel,
        )));

        Ok(())
    }

    /// Disconnect. Fails every pending request with `ConnectionLost` and
    /// cancels the background tasks. Idempotent.
    pub async fn close(&self) -> Result<()> {
        let cancel = self.cancel.lock().unwrap().clone();
        self.shared.on_disconnect(&cancel);
        let stale: Vec<_> = self.tasks.lock().unwrap().drain(..).collect();
        for task in stale {
            task.abort();
        }
        self.wireless.close().await?;
        Ok(())
    }

    /// Send a command and await its correlated response, using the default
    /// response timeout.
    pub async fn send(
        &self,
        channel: Channel,
        identifier: u8,
        payload: &[u8],
    ) -> Result<ParsedEnvelope> {
        self.send_with_timeout(channel, identifier, payload, self.config.response_timeout)
            .await
    }

    /// Send a command and await its correlated response.
    ///
    /// Fails fast with `NotOpened`/`NotReady` before any transport traffic.
    pub async fn send_with_timeout(
        &self,
        channel: Channel,
        identifier: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<ParsedEnvelope> {
        match self.shared.lifecycle.state() {
            ConnectionState::Closed => return Err(ClientError::NotOpened),
            ConnectionState::Open => return Err(ClientError::NotReady),
            ConnectionState::Ready => {}
        }
        match channel {
            Channel::Wireless => {
                send_wireless(
                    self.wireless.as_ref(),
                    &self.shared,
                    &self.wireless_lock,
                    &self.config,
                    identifier,
                    payload,
                    timeout,
                )
                .await
            }
            Channel::Http => {
                send_http(
                    self.http.as_ref(),
                    &self.shared,
                    &self.http_lock,
                    identifier,
                    payload,
                    timeout,
                )
                .await
            }
        }
    }

    /// Subscribe to pushes for one identifier, or for the whole domain
    /// (`identifier: None`). Idempotent per subscriber handle.
    pub fn register(&self, domain: Domain, identifier: Option<u8>, subscriber: &Subscriber) {
        self.shared
            .subscriptions
            .register(domain, identifier, subscriber);
    }

    /// Remove subscriptions. `identifier: None` removes the subscriber from
    /// every identifier in the domain including the wildcard set;
    /// `subscriber: None` clears all callbacks for the identifier.
    pub fn unregister(
        &self,
        domain: Domain,
        identifier: Option<u8>,
        subscriber: Option<&Subscriber>,
    ) {
        self.shared
            .subscriptions
            .unregister(domain, identifier, subscriber);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lifecycle.state()
    }

    /// Watch connection-state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.lifecycle.subscribe()
    }

    /// Suspend until the camera is ready for commands (or the connection
    /// closes first).
    pub async fn wait_for_ready(&self) -> Result<()> {
        self.shared.lifecycle.wait_for_ready().await
    }
}

impl<W, H> Drop for Communicator<W, H> {
    fn drop(&mut self) {
        if let Ok(cancel) = self.cancel.get_mut() {
            cancel.cancel();
        }
        if let Ok(tasks) = self.tasks.get_mut() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

/// Receive loop: fragments in, routed envelopes out.
///
/// Framing and decode errors are contained here: the offending message is
/// dropped, the channel lives on. The stream ending is the disconnect event.
async fn run_rx_loop(
    mut notifications: NotificationStream,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let mut reassembler = Reassembler::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            fragment = notifications.recv() => match fragment {
                Some(fragment) => process_fragment(&mut reassembler, &shared, &fragment),
                None => {
                    warn!("notification stream ended, closing connection");
                    shared.on_disconnect(&cancel);
                    break;
                }
            },
        }
    }
}

fn process_fragment(reassembler: &mut Reassembler, shared: &Shared, fragment: &[u8]) {
    trace!(len = fragment.len(), "fragment received");
    let message = match reassembler.feed(fragment) {
        Ok(Some(message)) => message,
        Ok(None) => return,
        Err(err) => {
            warn!(%err, "dropping fragment sequence");
            return;
        }
    };
    match RawMessage::parse(&message) {
        Ok(raw) => shared.route_message(&raw),
        Err(err) => warn!(%err, "dropping malformed message"),
    }
}

/// Keep-alive: periodically query the baseline statuses as a lightweight
/// liveness probe. Consecutive failures beyond the limit close the
/// connection. The probe also re-observes the baseline statuses, so a
/// camera that never pushes still becomes ready.
async fn run_keep_alive<W: WirelessTransport>(
    wireless: Arc<W>,
    shared: Arc<Shared>,
    wireless_lock: Arc<AsyncMutex<()>>,
    config: ClientConfig,
    cancel: CancellationToken,
) {
    let start = tokio::time::Instant::now() + config.keep_alive_interval;
    let mut interval = tokio::time::interval_at(start, config.keep_alive_interval);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let probe = send_wireless(
            wireless.as_ref(),
            &shared,
            &wireless_lock,
            &config,
            GET_STATUS_VALUES,
            &config.required_statuses,
            config.keep_alive_timeout,
        )
        .await;

        match probe {
            Ok(_) => {
                failures = 0;
                trace!("keep-alive probe ok");
            }
            Err(err) => {
                failures += 1;
                warn!(%err, failures, "keep-alive probe failed");
                if failures >= config.keep_alive_failure_limit {
                    error!("keep-alive exhausted, closing connection");
                    shared.on_disconnect(&cancel);
                    break;
                }
            }
        }
    }
}

/// Wireless send path: register the expected response, then write the
/// fragments, all under the channel's write lock so registration order
/// equals write order; await after releasing the lock.
async fn send_wireless<W: WirelessTransport + ?Sized>(
    wireless: &W,
    shared: &Shared,
    wireless_lock: &AsyncMutex<()>,
    config: &ClientConfig,
    identifier: u8,
    payload: &[u8],
    timeout: Duration,
) -> Result<ParsedEnvelope> {
    let handle = {
        let _write_guard = wireless_lock.lock().await;
        let handle = shared.correlator.register(Channel::Wireless, identifier);

        let mut body = Vec::with_capacity(1 + payload.len());
        body.push(identifier);
        body.extend_from_slice(payload);

        let fragments = match fragment_message(&body, config.mtu) {
            Ok(fragments) => fragments,
            Err(err) => {
                shared.correlator.cancel(handle);
                return Err(err.into());
            }
        };

        let mut write_failure = None;
        for fragment in &fragments {
            if let Err(err) = wireless.write(fragment).await {
                write_failure = Some(err);
                break;
            }
        }
        if let Some(err) = write_failure {
            shared.correlator.cancel(handle);
            return Err(err.into());
        }
        handle
    };

    shared.correlator.wait(handle, timeout).await
}

/// HTTP send path: same correlator accounting as wireless, with the reply
/// normalized into an envelope and delivered back to ourselves. The channel
/// lock spans the whole round trip.
async fn send_http<H: HttpChannel + ?Sized>(
    http: &H,
    shared: &Shared,
    http_lock: &AsyncMutex<()>,
    identifier: u8,
    payload: &[u8],
    timeout: Duration,
) -> Result<ParsedEnvelope> {
    let handle = {
        let _guard = http_lock.lock().await;
        let handle = shared.correlator.register(Channel::Http, identifier);

        let path = format!("command/{identifier}");
        let result = if payload.is_empty() {
            http.get(&path).await
        } else {
            http.post(&path, Bytes::copy_from_slice(payload)).await
        };

        match result.and_then(|reply| normalize_reply(identifier, reply)) {
            Ok(envelope) => shared.correlator.deliver(Channel::Http, envelope),
            Err(err) => {
                shared.correlator.cancel(handle);
                return Err(err.into());
            }
        }
        handle
    };

    shared.correlator.wait(handle, timeout).await
}
