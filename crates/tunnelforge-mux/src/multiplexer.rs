use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use tunnelforge_types::{BufferSnapshot, ClientFrame, ServerFrame};

use crate::registry::{Release, SnapshotReceiver, SubscriptionRegistry};
use crate::{Backoff, BackoffConfig, ConnectionState, Connector, MuxError, Transport};

#[derive(Debug, Clone)]
pub struct MultiplexerConfig {
    pub backoff: BackoffConfig,
    /// Keepalive ping period while connected.
    pub ping_interval: Duration,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            ping_interval: Duration::from_secs(30),
        }
    }
}

enum Command {
    Subscribe(String),
    Unsubscribe(String),
}

/// State shared between the multiplexer, its driver task and every live
/// subscription.
struct Hub {
    registry: Mutex<SubscriptionRegistry>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

impl Hub {
    fn registry(&self) -> MutexGuard<'_, SubscriptionRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(target: "mux", from = %previous, to = %state, "connection state changed");
        }
    }

    fn release(&self, session_id: &str, key: u64) {
        let outcome = self.registry().remove(session_id, key);
        if outcome == Release::LastForSession {
            let _ = self
                .commands
                .send(Command::Unsubscribe(session_id.to_string()));
        }
    }

    /// Turn a queued command into a frame, unless the registry has moved on
    /// since it was queued.
    fn frame_for(&self, command: Command) -> Option<ClientFrame> {
        match command {
            Command::Subscribe(id) if self.registry().contains(&id) => {
                Some(ClientFrame::subscribe(id))
            }
            Command::Unsubscribe(id) if !self.registry().contains(&id) => {
                Some(ClientFrame::unsubscribe(id))
            }
            _ => None,
        }
    }

    fn handle_frame(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Snapshot {
                session_id,
                snapshot,
            } => {
                let delivered = self.registry().dispatch(&session_id, Arc::new(snapshot));
                if delivered == 0 {
                    trace!(target: "mux", session_id = %session_id, "dropping snapshot for unsubscribed session");
                }
            }
            ServerFrame::Connected { version } => {
                debug!(target: "mux", version = %version, "buffer stream ready");
            }
            ServerFrame::Error { message } => {
                warn!(target: "mux", message = %message, "buffer stream reported an error");
            }
            other => trace!(target: "mux", frame = ?other, "control frame"),
        }
    }
}

/// Owner of the single shared snapshot connection.
///
/// Construct one per client process and hand clones to whatever needs to
/// subscribe; clones share the same connection. The connection is opened
/// lazily by the first [`subscribe`](Multiplexer::subscribe) call, which must
/// happen inside a tokio runtime.
pub struct Multiplexer<C: Connector> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    hub: Arc<Hub>,
    connector: Arc<C>,
    config: MultiplexerConfig,
    pending_commands: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<C> Drop for Inner<C> {
    fn drop(&mut self) {
        self.hub.shutdown.cancel();
    }
}

impl<C: Connector> Clone for Multiplexer<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> Multiplexer<C> {
    pub fn new(connector: C, config: MultiplexerConfig) -> Self {
        let (commands, pending) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Idle);

        let hub = Arc::new(Hub {
            registry: Mutex::new(SubscriptionRegistry::new()),
            commands,
            state,
            shutdown: CancellationToken::new(),
        });

        Self {
            inner: Arc::new(Inner {
                hub,
                connector: Arc::new(connector),
                config,
                pending_commands: Mutex::new(Some(pending)),
                driver: Mutex::new(None),
            }),
        }
    }

    /// Register interest in `session_id`. Snapshots addressed to it are
    /// yielded by the returned stream in arrival order.
    pub fn subscribe(&self, session_id: impl Into<String>) -> Result<Subscription, MuxError> {
        let hub = &self.inner.hub;
        if hub.shutdown.is_cancelled() {
            return Err(MuxError::Closed);
        }

        let session_id = session_id.into();
        let registration = hub.registry().add(&session_id);
        if registration.first_for_session {
            let _ = hub.commands.send(Command::Subscribe(session_id.clone()));
        }
        debug!(target: "mux", session_id = %session_id, key = registration.key, "subscribed");

        self.ensure_driver();

        Ok(Subscription {
            session_id,
            key: registration.key,
            receiver: registration.receiver,
            hub: Arc::clone(hub),
            closed: false,
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.hub.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Receiver that observes every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.hub.state.subscribe()
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.inner.hub.registry().subscriber_count(session_id)
    }

    /// Close the connection and stop reconnecting. Existing subscriptions
    /// stay valid but receive nothing further.
    pub async fn shutdown(&self) {
        let hub = &self.inner.hub;
        hub.shutdown.cancel();

        let driver = self
            .inner
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(driver) = driver {
            let _ = driver.await;
        }
        hub.set_state(ConnectionState::Closed);
    }

    fn ensure_driver(&self) {
        let mut driver = self
            .inner
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if driver.is_some() {
            return;
        }
        let Some(commands) = self
            .inner
            .pending_commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let task = run_driver(
            Arc::clone(&self.inner.connector),
            Arc::clone(&self.inner.hub),
            commands,
            self.inner.config.clone(),
        );
        *driver = Some(tokio::spawn(task));
    }
}

/// A live interest in one session's snapshots.
///
/// Dropping the handle unsubscribes. [`close`](Subscription::close) does the
/// same eagerly and may be called any number of times.
pub struct Subscription {
    session_id: String,
    key: u64,
    receiver: SnapshotReceiver,
    hub: Arc<Hub>,
    closed: bool,
}

impl Subscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.receiver.close();
        self.hub.release(&self.session_id, self.key);
        debug!(target: "mux", session_id = %self.session_id, key = self.key, "unsubscribed");
    }
}

impl Stream for Subscription {
    type Item = Arc<BufferSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("session_id", &self.session_id)
            .field("key", &self.key)
            .field("closed", &self.closed)
            .finish()
    }
}

// ============================================================================
// Driver
// ============================================================================

async fn run_driver<C: Connector>(
    connector: Arc<C>,
    hub: Arc<Hub>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    config: MultiplexerConfig,
) {
    let mut backoff = Backoff::new(config.backoff);
    hub.set_state(ConnectionState::Connecting);

    loop {
        let connected = tokio::select! {
            _ = hub.shutdown.cancelled() => break,
            result = connector.connect() => result,
        };

        match connected {
            Ok(mut transport) => {
                backoff.reset();
                hub.set_state(ConnectionState::Connected);
                info!(target: "mux", "buffer connection established");

                match serve_connection(&mut transport, &hub, &mut commands, &config).await {
                    Ok(()) => break,
                    Err(err) => warn!(target: "mux", error = %err, "buffer connection lost"),
                }
            }
            Err(err) => {
                warn!(target: "mux", attempt = backoff.attempt(), error = %err, "buffer connection failed");
            }
        }

        let delay = backoff.next_delay();
        hub.set_state(ConnectionState::Reconnecting {
            attempt: backoff.attempt(),
        });
        debug!(target: "mux", delay_ms = delay.as_millis() as u64, "waiting before reconnect");

        tokio::select! {
            _ = hub.shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    hub.set_state(ConnectionState::Closed);
    info!(target: "mux", "buffer connection closed");
}

/// Pump one established connection. `Ok` means shutdown was requested.
async fn serve_connection<T: Transport>(
    transport: &mut T,
    hub: &Hub,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    config: &MultiplexerConfig,
) -> Result<(), MuxError> {
    // Commands queued while disconnected are superseded by a full resubscribe.
    while commands.try_recv().is_ok() {}

    let sessions = hub.registry().sessions();
    for session_id in sessions {
        transport.send(&ClientFrame::subscribe(session_id)).await?;
    }

    let mut ping = interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = hub.shutdown.cancelled() => {
                let _ = transport.close().await;
                return Ok(());
            }
            frame = transport.next_frame() => match frame {
                Some(Ok(frame)) => hub.handle_frame(frame),
                Some(Err(MuxError::Protocol(err))) => {
                    warn!(target: "mux", error = %err, "ignoring undecodable frame");
                }
                Some(Err(err)) => return Err(err),
                None => return Err(MuxError::TransportDisconnected),
            },
            Some(command) = commands.recv() => {
                if let Some(frame) = hub.frame_for(command) {
                    transport.send(&frame).await?;
                }
            }
            _ = ping.tick() => transport.send(&ClientFrame::Ping).await?,
        }
    }
}
