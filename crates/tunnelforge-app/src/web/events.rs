//! Server-sent event streams.
//!
//! Streams yield axum [`Event`]s; the routes wrap them in [`axum::response::sse::Sse`].
//! Heartbeats are emitted in-stream rather than through `KeepAlive` because
//! `/api/events` stamps each one with the current time. Each stream owns its
//! timers; dropping the stream, whether because the client went away or
//! because the lifetime elapsed, cancels them and runs cleanup once.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

pub use crate::control::GitEventKind;

#[derive(Debug, Clone)]
pub struct EventStreamConfig {
    pub heartbeat_interval: Duration,
    /// Streams are closed after this long; clients reconnect.
    pub max_lifetime: Duration,
}

impl Default for EventStreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(5 * 60),
        }
    }
}

/// A repository event relayed to `/api/events` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitNotice {
    pub repo_path: String,
    #[serde(rename = "type")]
    pub kind: GitEventKind,
}

/// Which endpoint a stream serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Events,
    Control,
}

impl StreamKind {
    fn label(self) -> &'static str {
        match self {
            StreamKind::Events => "events",
            StreamKind::Control => "control",
        }
    }
}

/// Shared bookkeeping for open streams plus the git event fan-out.
pub struct EventHub {
    config: EventStreamConfig,
    git: broadcast::Sender<GitNotice>,
    open: AtomicUsize,
    closed: AtomicU64,
}

impl EventHub {
    pub fn new(config: EventStreamConfig) -> Self {
        let (git, _) = broadcast::channel(64);
        Self {
            config,
            git,
            open: AtomicUsize::new(0),
            closed: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EventStreamConfig {
        &self.config
    }

    /// Number of `/api/events` streams that received the notice.
    pub fn publish_git(&self, notice: GitNotice) -> usize {
        self.git.send(notice).unwrap_or(0)
    }

    pub fn open_streams(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn closed_streams(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn events_stream(
        self: &Arc<Self>,
    ) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
        let receiver = self.git.subscribe();
        event_stream(Arc::clone(self), StreamKind::Events, Some(receiver))
    }

    pub fn control_stream(
        self: &Arc<Self>,
    ) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
        event_stream(Arc::clone(self), StreamKind::Control, None)
    }
}

/// Decrements the open count when the owning stream is dropped.
struct StreamGuard {
    hub: Arc<EventHub>,
    id: Uuid,
    kind: StreamKind,
    opened: Instant,
}

impl StreamGuard {
    fn open(hub: Arc<EventHub>, kind: StreamKind) -> Self {
        hub.open.fetch_add(1, Ordering::SeqCst);
        let guard = Self {
            hub,
            id: Uuid::new_v4(),
            kind,
            opened: Instant::now(),
        };
        debug!(target: "gateway::events", stream = %guard.id, kind = kind.label(), "event stream opened");
        guard
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.hub.open.fetch_sub(1, Ordering::SeqCst);
        self.hub.closed.fetch_add(1, Ordering::SeqCst);
        debug!(
            target: "gateway::events",
            stream = %self.id,
            kind = self.kind.label(),
            open_for_ms = self.opened.elapsed().as_millis() as u64,
            "event stream closed"
        );
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn connected_event(timestamp: i64) -> Event {
    let data = serde_json::json!({ "type": "connected", "timestamp": timestamp });
    Event::default()
        .id("1")
        .event("connected")
        .data(data.to_string())
}

pub fn git_event(id: u64, notice: &GitNotice) -> Event {
    let data = serde_json::to_string(notice).unwrap_or_else(|_| "{}".to_string());
    Event::default().id(id.to_string()).event("git").data(data)
}

fn heartbeat_event(kind: StreamKind) -> Event {
    match kind {
        StreamKind::Events => Event::default().comment(format!("heartbeat {}", now_millis())),
        StreamKind::Control => Event::default().comment("heartbeat"),
    }
}

enum Step {
    Send(Event),
    Skip,
    GitClosed,
    End,
}

fn event_stream(
    hub: Arc<EventHub>,
    kind: StreamKind,
    mut git: Option<broadcast::Receiver<GitNotice>>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    async_stream::stream! {
        let guard = StreamGuard::open(Arc::clone(&hub), kind);
        let config = hub.config().clone();

        let first = match kind {
            StreamKind::Events => connected_event(now_millis()),
            StreamKind::Control => Event::default().comment("ok"),
        };
        yield Ok(first);

        let lifetime = sleep(config.max_lifetime);
        tokio::pin!(lifetime);
        let mut heartbeat = interval_at(
            Instant::now() + config.heartbeat_interval,
            config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_id: u64 = 2;

        loop {
            let step = tokio::select! {
                biased;
                _ = &mut lifetime => Step::End,
                _ = heartbeat.tick() => Step::Send(heartbeat_event(kind)),
                notice = recv_git(&mut git) => match notice {
                    Ok(notice) => {
                        let event = git_event(next_id, &notice);
                        next_id += 1;
                        Step::Send(event)
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(target: "gateway::events", missed, "event stream lagged");
                        Step::Skip
                    }
                    Err(broadcast::error::RecvError::Closed) => Step::GitClosed,
                },
            };

            match step {
                Step::Send(event) => yield Ok(event),
                Step::Skip => {}
                Step::GitClosed => git = None,
                Step::End => break,
            }
        }

        info!(target: "gateway::events", stream = %guard.id, kind = kind.label(), "event stream reached its lifetime");
    }
}

async fn recv_git(
    receiver: &mut Option<broadcast::Receiver<GitNotice>>,
) -> Result<GitNotice, broadcast::error::RecvError> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::{sse::Sse, IntoResponse};
    use futures::StreamExt;

    /// Serialize events exactly as the routes send them, one chunk per event.
    fn wire(
        events: impl Stream<Item = Result<Event, Infallible>> + Send + 'static,
    ) -> impl Stream<Item = String> {
        Sse::new(events)
            .into_response()
            .into_body()
            .into_data_stream()
            .map(|chunk| String::from_utf8(chunk.unwrap().to_vec()).unwrap())
    }

    #[tokio::test]
    async fn connected_event_format() {
        let mut chunks = Box::pin(wire(futures::stream::iter([Ok(connected_event(
            1700000000000,
        ))])));
        let frame = chunks.next().await.unwrap();
        let data = frame
            .strip_prefix("id:1\nevent:connected\ndata:")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        let data: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(
            data,
            serde_json::json!({"type": "connected", "timestamp": 1700000000000i64})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn control_stream_heartbeats_then_closes() {
        let hub = Arc::new(EventHub::new(EventStreamConfig::default()));
        let mut stream = Box::pin(wire(hub.control_stream()));

        assert_eq!(stream.next().await.unwrap(), ":ok\n\n");
        assert_eq!(hub.open_streams(), 1);

        let start = Instant::now();
        let mut heartbeats = 0;
        while let Some(chunk) = stream.next().await {
            assert_eq!(chunk, ":heartbeat\n\n");
            heartbeats += 1;
        }
        assert_eq!(heartbeats, 9);
        assert_eq!(start.elapsed(), Duration::from_secs(300));
        assert_eq!(hub.open_streams(), 0);
        assert_eq!(hub.closed_streams(), 1);

        drop(stream);
        assert_eq!(hub.closed_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn git_notices_reach_event_streams() {
        let hub = Arc::new(EventHub::new(EventStreamConfig::default()));
        let mut stream = Box::pin(wire(hub.events_stream()));
        assert!(stream
            .next()
            .await
            .unwrap()
            .starts_with("id:1\nevent:connected\n"));

        let delivered = hub.publish_git(GitNotice {
            repo_path: "/repo".into(),
            kind: GitEventKind::Checkout,
        });
        assert_eq!(delivered, 1);
        assert_eq!(
            stream.next().await.unwrap(),
            "id:2\nevent:git\ndata:{\"repoPath\":\"/repo\",\"type\":\"checkout\"}\n\n"
        );

        let heartbeat = stream.next().await.unwrap();
        assert!(heartbeat.starts_with(":heartbeat "), "{heartbeat}");
    }

    #[tokio::test]
    async fn dropping_early_cleans_up_once() {
        let hub = Arc::new(EventHub::new(EventStreamConfig::default()));
        let mut stream = Box::pin(hub.events_stream());
        let _ = stream.next().await;
        drop(stream);

        assert_eq!(hub.open_streams(), 0);
        assert_eq!(hub.closed_streams(), 1);
        assert_eq!(hub.publish_git(GitNotice {
            repo_path: "/r".into(),
            kind: GitEventKind::Other,
        }), 0);
    }
}
