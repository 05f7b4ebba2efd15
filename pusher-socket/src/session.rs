//! Connection session: handshake sequencing, public operations, and the
//! background keepalive and read/dispatch loops.
//!
//! A session owns the framed transport, the subscription set, the binding
//! table, and (when configured) the channel-authorization client. The two
//! background loops share the write half behind a mutex and honor a watch
//! channel for cancellation, so `close()` tears everything down
//! deterministically. There is no automatic reconnection: when the
//! transport fails, the session transitions to `Disconnected` and stays
//! there; callers watching `state_receiver()` decide whether to rebuild.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use pusher_auth::AuthClient;
use pusher_core::config::PusherConfig;
use pusher_core::error::{PusherError, PusherResult};

use crate::protocol::{frames, Envelope, ErrorPayload, SessionDescriptor, SystemEvent};
use crate::registry::{BindingTable, SubscriptionSet};
use crate::transport::{self, FrameSink, FrameSource};

/// Connection state for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected and dispatching events.
    Connected,
    /// The transport failed or the session was closed. Terminal.
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

/// A live connection session to the service.
pub struct Session {
    /// Descriptor assigned by the service at handshake.
    descriptor: SessionDescriptor,
    /// Write half of the transport, shared with both background loops.
    writer: SharedSink,
    /// Channels currently subscribed.
    subscriptions: Arc<SubscriptionSet>,
    /// Event-name to delivery-channel registry.
    bindings: Arc<BindingTable>,
    /// Authorization client for private channels, when configured.
    auth: Option<AuthClient>,
    /// Capacity for delivery channels handed out by `bind`.
    delivery_capacity: usize,
    /// Cancellation signal honored by both loops.
    cancel_tx: watch::Sender<bool>,
    /// Connection state for external observers.
    state_tx: Arc<watch::Sender<ConnectionState>>,
    /// Handle to the keepalive task.
    keepalive_task: Mutex<Option<JoinHandle<()>>>,
    /// Handle to the read/dispatch task.
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Dial the service and perform the session-establishment handshake.
    ///
    /// Blocks until the service's first frame arrives. A `pusher:error`
    /// first frame fails with the service's code and message; any other
    /// unexpected frame, or a transport/decode error at this stage, is a
    /// fatal setup failure and no session is produced.
    pub async fn connect(config: &PusherConfig) -> PusherResult<Session> {
        let url = config.ws_url()?;
        info!("connecting to {}", config.host);
        let (sink, source) = transport::dial(&url).await?;
        Self::establish(Box::new(sink), Box::new(source), config).await
    }

    /// Run the handshake over an already-open transport and start the
    /// background loops.
    async fn establish(
        sink: Box<dyn FrameSink>,
        mut source: Box<dyn FrameSource>,
        config: &PusherConfig,
    ) -> PusherResult<Session> {
        let first = match source.next_frame().await {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(e),
            None => {
                return Err(PusherError::Handshake(
                    "connection closed before session establishment".into(),
                ))
            }
        };

        let envelope = Envelope::decode(&first)
            .map_err(|e| PusherError::Handshake(format!("malformed first frame: {e}")))?;

        let descriptor = match envelope.system_event() {
            SystemEvent::ConnectionEstablished => {
                let descriptor: SessionDescriptor = serde_json::from_str(&envelope.data)
                    .map_err(|e| {
                        PusherError::Handshake(format!("malformed session descriptor: {e}"))
                    })?;
                descriptor
            }
            SystemEvent::Error => {
                let payload: ErrorPayload = serde_json::from_str(&envelope.data)
                    .map_err(|e| PusherError::Handshake(format!("malformed error frame: {e}")))?;
                return Err(PusherError::Protocol {
                    code: payload.code,
                    message: payload.message,
                });
            }
            other => {
                return Err(PusherError::Handshake(format!(
                    "unexpected first frame event {}",
                    other.as_name()
                )))
            }
        };

        info!(
            "session established, socket_id={} activity_timeout={}s",
            descriptor.socket_id, descriptor.activity_timeout
        );

        let auth = if config.is_auth_configured() {
            Some(AuthClient::new(&config.auth)?)
        } else {
            None
        };

        let writer: SharedSink = Arc::new(Mutex::new(sink));
        let subscriptions = Arc::new(SubscriptionSet::new());
        let bindings = Arc::new(BindingTable::new());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, _) = watch::channel(ConnectionState::Connected);
        let state_tx = Arc::new(state_tx);

        let keepalive_task = tokio::spawn(keepalive_loop(
            writer.clone(),
            Duration::from_secs(config.keepalive_interval_secs),
            cancel_rx.clone(),
        ));
        let dispatch_task = tokio::spawn(read_dispatch_loop(
            source,
            writer.clone(),
            bindings.clone(),
            cancel_rx,
            state_tx.clone(),
        ));

        Ok(Session {
            descriptor,
            writer,
            subscriptions,
            bindings,
            auth,
            delivery_capacity: config.delivery_channel_capacity,
            cancel_tx,
            state_tx,
            keepalive_task: Mutex::new(Some(keepalive_task)),
            dispatch_task: Mutex::new(Some(dispatch_task)),
        })
    }

    /// The connection identifier assigned by the service.
    pub fn socket_id(&self) -> &str {
        &self.descriptor.socket_id
    }

    /// The service's activity-timeout hint, in seconds. Informational.
    pub fn activity_timeout(&self) -> u64 {
        self.descriptor.activity_timeout
    }

    /// Whether the session is currently connected.
    pub fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the currently subscribed channel names.
    pub async fn subscribed_channels(&self) -> Vec<String> {
        self.subscriptions.channels().await
    }

    /// Subscribe to a public channel.
    ///
    /// The subscribe frame is sent before the set is updated: if the send
    /// fails the channel is not marked subscribed, so retrying is safe.
    pub async fn subscribe(&self, channel: &str) -> PusherResult<()> {
        if self.subscriptions.contains(channel).await {
            return Err(PusherError::AlreadySubscribed(channel.to_string()));
        }
        self.send_frame(frames::subscribe(channel)?).await?;
        self.subscriptions.insert(channel).await;
        debug!("subscribed to {channel}");
        Ok(())
    }

    /// Subscribe to a channel requiring the authorization handshake.
    ///
    /// Strict sequence: authorize over HTTP, inject the channel name into
    /// the returned body, send the subscribe frame, then mark subscribed.
    /// Any failure leaves the subscription set unchanged; there is no retry.
    pub async fn subscribe_with_auth(&self, channel: &str) -> PusherResult<()> {
        if self.subscriptions.contains(channel).await {
            return Err(PusherError::AlreadySubscribed(channel.to_string()));
        }
        let auth = self
            .auth
            .as_ref()
            .ok_or_else(|| PusherError::MissingConfig("auth.url".into()))?;

        let body = auth.authorize(&self.descriptor.socket_id, channel).await?;
        let frame = frames::authorized_subscribe(&body, channel)?;
        self.send_frame(frame).await?;
        self.subscriptions.insert(channel).await;
        debug!("subscribed to authorized channel {channel}");
        Ok(())
    }

    /// Unsubscribe from a channel.
    pub async fn unsubscribe(&self, channel: &str) -> PusherResult<()> {
        if !self.subscriptions.contains(channel).await {
            return Err(PusherError::NotSubscribed(channel.to_string()));
        }
        self.send_frame(frames::unsubscribe(channel)?).await?;
        self.subscriptions.remove(channel).await;
        debug!("unsubscribed from {channel}");
        Ok(())
    }

    /// Bind an event name to a new delivery channel and return the receiver.
    ///
    /// The dispatch loop writes matching envelopes into the channel; the
    /// caller owns the read side for the binding's lifetime.
    pub async fn bind(&self, event: &str) -> PusherResult<mpsc::Receiver<Envelope>> {
        self.bindings.bind(event, self.delivery_capacity).await
    }

    /// Remove the binding for an event name. No error if absent.
    pub async fn unbind(&self, event: &str) {
        self.bindings.unbind(event).await;
    }

    /// Close the session: signal both loops, close the transport, and
    /// reap the background tasks. Idempotent.
    pub async fn close(&self) {
        let _ = self.cancel_tx.send(true);

        if let Err(e) = self.writer.lock().await.close().await {
            debug!("transport close: {e}");
        }
        let _ = self.state_tx.send(ConnectionState::Disconnected);

        if let Some(handle) = self.keepalive_task.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.dispatch_task.lock().await.take() {
            handle.abort();
        }
        info!("session closed");
    }

    /// Send one encoded frame over the shared write half.
    async fn send_frame(&self, frame: String) -> PusherResult<()> {
        self.writer.lock().await.send_frame(frame).await
    }
}

/// Periodically emit a keepalive ping until cancelled.
///
/// A send failure means the transport is gone; the loop logs it and exits
/// rather than spinning against a dead connection.
async fn keepalive_loop(writer: SharedSink, interval: Duration, mut cancel: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = cancel.changed() => {
                debug!("keepalive loop cancelled");
                return;
            }
            _ = sleep(interval) => {
                if let Err(e) = writer.lock().await.send_frame(frames::ping()).await {
                    warn!("keepalive ping failed: {e}");
                    return;
                }
                debug!("keepalive ping sent");
            }
        }
    }
}

/// Read frames until cancellation or transport failure, routing each to
/// protocol handling or the binding table.
///
/// Frames are processed strictly in arrival order. Decode failures are
/// logged and skipped; only transport failure or stream end terminates
/// the loop, which then marks the session disconnected.
async fn read_dispatch_loop(
    mut source: Box<dyn FrameSource>,
    writer: SharedSink,
    bindings: Arc<BindingTable>,
    mut cancel: watch::Receiver<bool>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
) {
    loop {
        tokio::select! {
            _ = cancel.changed() => {
                debug!("dispatch loop cancelled");
                return;
            }
            frame = source.next_frame() => {
                match frame {
                    Some(Ok(text)) => {
                        let envelope = match Envelope::decode(&text) {
                            Ok(envelope) => envelope,
                            Err(e) => {
                                warn!("undecodable frame, skipping: {e}");
                                continue;
                            }
                        };
                        handle_frame(envelope, &writer, &bindings).await;
                    }
                    Some(Err(e)) => {
                        warn!("transport error, dispatch loop exiting: {e}");
                        let _ = state_tx.send(ConnectionState::Disconnected);
                        return;
                    }
                    None => {
                        info!("connection closed by peer");
                        let _ = state_tx.send(ConnectionState::Disconnected);
                        return;
                    }
                }
            }
        }
    }
}

/// Route one decoded envelope.
async fn handle_frame(envelope: Envelope, writer: &SharedSink, bindings: &BindingTable) {
    match envelope.system_event() {
        SystemEvent::Ping => {
            if let Err(e) = writer.lock().await.send_frame(frames::pong()).await {
                warn!("failed to answer ping: {e}");
            }
        }
        // Our own pings carry no correlation; the peer's pong is purely a
        // liveness signal.
        SystemEvent::Pong => {}
        SystemEvent::Error => match serde_json::from_str::<ErrorPayload>(&envelope.data) {
            Ok(payload) => {
                warn!("service error (code {}): {}", payload.code, payload.message)
            }
            Err(_) => warn!("service error: {}", envelope.data),
        },
        // Everything else, reserved names included, flows through the
        // binding table; unbound names are dropped there.
        SystemEvent::ConnectionEstablished
        | SystemEvent::Subscribe
        | SystemEvent::Unsubscribe
        | SystemEvent::Application(_) => {
            bindings.deliver(envelope).await;
        }
    }
}
