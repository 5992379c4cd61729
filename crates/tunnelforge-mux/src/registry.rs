use std::collections::HashMap;
use std::sync::Arc;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use tunnelforge_types::BufferSnapshot;

pub type SnapshotSender = UnboundedSender<Arc<BufferSnapshot>>;
pub type SnapshotReceiver = UnboundedReceiver<Arc<BufferSnapshot>>;

/// Result of adding a subscriber.
pub struct Registration {
    pub key: u64,
    pub receiver: SnapshotReceiver,
    /// The session had no subscribers before this one.
    pub first_for_session: bool,
}

/// Result of removing a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// That was the session's last subscriber.
    LastForSession,
    /// Other subscribers remain for the session.
    Remaining,
    /// The key was not registered, e.g. a second release of the same handle.
    NotFound,
}

/// Subscribers grouped by session id.
///
/// Pure bookkeeping with no I/O, so browser and native drivers share it.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_key: u64,
    sessions: HashMap<String, HashMap<u64, SnapshotSender>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, session_id: &str) -> Registration {
        let (sender, receiver) = unbounded();
        let key = self.next_key;
        self.next_key += 1;

        let subscribers = self.sessions.entry(session_id.to_string()).or_default();
        let first_for_session = subscribers.is_empty();
        subscribers.insert(key, sender);

        Registration {
            key,
            receiver,
            first_for_session,
        }
    }

    pub fn remove(&mut self, session_id: &str, key: u64) -> Release {
        let Some(subscribers) = self.sessions.get_mut(session_id) else {
            return Release::NotFound;
        };
        if subscribers.remove(&key).is_none() {
            return Release::NotFound;
        }
        if subscribers.is_empty() {
            self.sessions.remove(session_id);
            Release::LastForSession
        } else {
            Release::Remaining
        }
    }

    /// Deliver to every subscriber of `session_id`. Returns how many
    /// subscribers accepted the snapshot; zero means the id is unknown.
    pub fn dispatch(&self, session_id: &str, snapshot: Arc<BufferSnapshot>) -> usize {
        let Some(subscribers) = self.sessions.get(session_id) else {
            return 0;
        };
        subscribers
            .values()
            .filter(|sender| sender.unbounded_send(Arc::clone(&snapshot)).is_ok())
            .count()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.sessions.get(session_id).map_or(0, HashMap::len)
    }

    /// Sessions with at least one subscriber.
    pub fn sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, StreamExt};

    #[test]
    fn first_and_last_are_reported_per_session() {
        let mut registry = SubscriptionRegistry::new();
        let a = registry.add("s1");
        let b = registry.add("s1");
        let c = registry.add("s2");

        assert!(a.first_for_session);
        assert!(!b.first_for_session);
        assert!(c.first_for_session);
        assert_eq!(registry.sessions(), vec!["s1", "s2"]);

        assert_eq!(registry.remove("s1", a.key), Release::Remaining);
        assert_eq!(registry.remove("s1", a.key), Release::NotFound);
        assert_eq!(registry.remove("s1", b.key), Release::LastForSession);
        assert!(!registry.contains("s1"));
        assert_eq!(registry.subscriber_count("s2"), 1);
    }

    #[test]
    fn dispatch_only_reaches_matching_session() {
        let mut registry = SubscriptionRegistry::new();
        let mut one = registry.add("s1");
        let mut two = registry.add("s2");

        let snapshot = Arc::new(BufferSnapshot::blank(2, 1));
        assert_eq!(registry.dispatch("s1", snapshot.clone()), 1);
        assert_eq!(registry.dispatch("ghost", snapshot), 0);

        assert!(matches!(one.receiver.next().now_or_never(), Some(Some(_))));
        assert!(two.receiver.next().now_or_never().is_none());
    }
}
