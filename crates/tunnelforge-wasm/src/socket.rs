//! Browser side of the buffer connection.
//!
//! Same contract as the native multiplexer: one websocket per page, one
//! channel per subscriber, subscribe on the first interest in a session and
//! unsubscribe on the last, resubscribe everything after a reconnect. The
//! registry and backoff are shared with the native crate; only the socket and
//! timers are browser-specific.

use std::cell::RefCell;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{select, SinkExt, Stream, StreamExt};
use gloo_net::websocket::{futures::WebSocket, Message as WsMessage};
use gloo_timers::future::{IntervalStream, TimeoutFuture};
use tunnelforge_mux::registry::SnapshotReceiver;
use tunnelforge_mux::{Backoff, BackoffConfig, ConnectionState, Release, SubscriptionRegistry};
use tunnelforge_types::{BufferSnapshot, ClientFrame, ServerFrame};
use wasm_bindgen::JsValue;

use crate::utils::{js_error, timeout_millis};

const PING_INTERVAL_MS: u32 = 30_000;

enum Command {
    Subscribe(String),
    Unsubscribe(String),
}

struct Inner {
    url: String,
    backoff: BackoffConfig,
    registry: RefCell<SubscriptionRegistry>,
    state: RefCell<ConnectionState>,
    commands: UnboundedSender<Command>,
    pending: RefCell<Option<UnboundedReceiver<Command>>>,
    closed: RefCell<bool>,
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.replace(state);
        if previous != state {
            log::debug!("buffer socket {} -> {}", previous, state);
        }
    }

    fn release(&self, session_id: &str, key: u64) {
        let outcome = self.registry.borrow_mut().remove(session_id, key);
        if outcome == Release::LastForSession {
            let _ = self
                .commands
                .unbounded_send(Command::Unsubscribe(session_id.to_string()));
        }
    }

    fn frame_for(&self, command: Command) -> Option<ClientFrame> {
        let registry = self.registry.borrow();
        match command {
            Command::Subscribe(id) if registry.contains(&id) => Some(ClientFrame::subscribe(id)),
            Command::Unsubscribe(id) if !registry.contains(&id) => {
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
                self.registry
                    .borrow()
                    .dispatch(&session_id, Arc::new(snapshot));
            }
            ServerFrame::Error { message } => log::warn!("buffer stream error: {}", message),
            other => log::trace!("buffer control frame: {:?}", other),
        }
    }
}

/// Shared handle to the page's single buffer connection.
#[derive(Clone)]
pub struct BufferSocket {
    inner: Rc<Inner>,
}

impl BufferSocket {
    pub fn new(url: String, backoff: BackoffConfig) -> Self {
        let (commands, pending) = unbounded();
        Self {
            inner: Rc::new(Inner {
                url,
                backoff,
                registry: RefCell::new(SubscriptionRegistry::new()),
                state: RefCell::new(ConnectionState::Idle),
                commands,
                pending: RefCell::new(Some(pending)),
                closed: RefCell::new(false),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self, session_id: &str) -> Result<SocketSubscription, JsValue> {
        if *self.inner.closed.borrow() {
            return Err(JsValue::from_str("buffer socket is closed"));
        }

        let registration = self.inner.registry.borrow_mut().add(session_id);
        if registration.first_for_session {
            let _ = self
                .inner
                .commands
                .unbounded_send(Command::Subscribe(session_id.to_string()));
        }

        if let Some(commands) = self.inner.pending.borrow_mut().take() {
            wasm_bindgen_futures::spawn_local(drive(Rc::clone(&self.inner), commands));
        }

        Ok(SocketSubscription {
            session_id: session_id.to_string(),
            key: registration.key,
            receiver: registration.receiver,
            inner: Rc::clone(&self.inner),
            closed: false,
        })
    }

    /// Stop reconnecting and drop the socket at the next opportunity.
    pub fn close(&self) {
        self.inner.closed.replace(true);
        self.inner.commands.close_channel();
    }
}

/// Snapshots for one session. Dropping it unsubscribes.
pub struct SocketSubscription {
    session_id: String,
    key: u64,
    receiver: SnapshotReceiver,
    inner: Rc<Inner>,
    closed: bool,
}

impl SocketSubscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.receiver.close();
        self.inner.release(&self.session_id, self.key);
    }
}

impl Stream for SocketSubscription {
    type Item = Arc<BufferSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl Drop for SocketSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Driver
// ============================================================================

async fn drive(inner: Rc<Inner>, mut commands: UnboundedReceiver<Command>) {
    let mut backoff = Backoff::new(inner.backoff);
    inner.set_state(ConnectionState::Connecting);

    loop {
        match WebSocket::open(&inner.url) {
            Ok(ws) => match serve(ws, &inner, &mut commands, &mut backoff).await {
                Ok(()) => break,
                Err(err) => log::warn!("buffer socket lost: {:?}", err),
            },
            Err(err) => log::warn!("buffer socket failed to open: {:?}", err),
        }

        if *inner.closed.borrow() {
            break;
        }

        let delay = backoff.next_delay();
        inner.set_state(ConnectionState::Reconnecting {
            attempt: backoff.attempt(),
        });
        log::info!("reconnecting in {}ms", delay.as_millis());
        TimeoutFuture::new(timeout_millis(delay)).await;

        if *inner.closed.borrow() {
            break;
        }
    }

    inner.set_state(ConnectionState::Closed);
}

/// Pump one socket. `Ok` means the socket was closed on purpose.
async fn serve(
    ws: WebSocket,
    inner: &Inner,
    commands: &mut UnboundedReceiver<Command>,
    backoff: &mut Backoff,
) -> Result<(), JsValue> {
    let (mut sink, stream) = ws.split();
    let mut stream = stream.fuse();

    let send = |frame: ClientFrame| -> Result<WsMessage, JsValue> {
        frame
            .to_text()
            .map(WsMessage::Text)
            .map_err(|e| js_error("Failed to serialize", e))
    };

    // The first send completes once the socket is open.
    sink.send(send(ClientFrame::Ping)?)
        .await
        .map_err(|e| js_error("Failed to open", e))?;
    backoff.reset();
    inner.set_state(ConnectionState::Connected);

    // Anything queued while disconnected is covered by the full resubscribe.
    while let Ok(Some(_)) = commands.try_next() {}
    let sessions = inner.registry.borrow().sessions();
    for session_id in sessions {
        sink.send(send(ClientFrame::subscribe(session_id))?)
            .await
            .map_err(|e| js_error("Failed to send", e))?;
    }

    let mut ping = IntervalStream::new(PING_INTERVAL_MS).fuse();

    loop {
        select! {
            message = stream.next() => match message {
                Some(Ok(WsMessage::Text(text))) => match ServerFrame::from_text(&text) {
                    Ok(frame) => inner.handle_frame(frame),
                    Err(err) => log::warn!("ignoring text frame: {}", err),
                },
                Some(Ok(WsMessage::Bytes(bytes))) => match ServerFrame::from_binary(&bytes) {
                    Ok(frame) => inner.handle_frame(frame),
                    Err(err) => log::warn!("ignoring binary frame: {}", err),
                },
                Some(Err(err)) => return Err(js_error("WebSocket error", err)),
                None => return Err(JsValue::from_str("WebSocket closed")),
            },
            command = commands.next() => match command {
                Some(command) => {
                    if let Some(frame) = inner.frame_for(command) {
                        sink.send(send(frame)?)
                            .await
                            .map_err(|e| js_error("Failed to send", e))?;
                    }
                }
                // Channel closed by BufferSocket::close
                None => {
                    let _ = sink.close().await;
                    return Ok(());
                }
            },
            _ = ping.next() => {
                sink.send(send(ClientFrame::Ping)?)
                    .await
                    .map_err(|e| js_error("Failed to send", e))?;
            }
        }
    }
}
