use crate::message::{Event, SessionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Registry of per-session private channels.
///
/// Presence of an entry is the liveness flag for a session: the merged
/// stream handed out by [`crate::Manager::subscribe`] stops as soon as it
/// observes that its entry is gone.
///
/// Every entry is stamped with a generation when it is created, so a
/// subscriber that outlives its entry (e.g. a connection torn down after the
/// client already reconnected) cannot release a newer entry for the same id.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionChannel>,
    capacity: usize,
    next_generation: AtomicU64,
}

struct SessionChannel {
    sender: broadcast::Sender<Event>,
    generation: u64,
    subscribers: usize,
}

/// A subscriber's claim on a session's private channel.
#[derive(Clone, Debug)]
pub struct Registration {
    pub sender: broadcast::Sender<Event>,
    pub generation: u64,
}

impl SessionRegistry {
    /// Create a registry whose private channels buffer up to `capacity`
    /// events per receiver before dropping the oldest.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            // broadcast::channel panics on a zero capacity
            capacity: capacity.max(1),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Get or create the private channel for a session and count one more
    /// subscriber on it. Pair every call with [`SessionRegistry::release`].
    pub fn register(&self, session_id: &SessionId) -> Registration {
        let mut channel = self.sessions.entry(session_id.clone()).or_insert_with(|| {
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            info!("Registering event channel for session {session_id} (generation {generation})");
            SessionChannel {
                sender: broadcast::channel(self.capacity).0,
                generation,
                subscribers: 0,
            }
        });
        channel.subscribers += 1;

        Registration {
            sender: channel.sender.clone(),
            generation: channel.generation,
        }
    }

    pub fn is_registered(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Whether the entry `generation` was issued for is still registered.
    pub fn is_current(&self, session_id: &SessionId, generation: u64) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|channel| channel.generation == generation)
    }

    /// Drop one subscriber from the entry `generation` was issued for,
    /// removing the entry once nobody is left on it. Releasing a stale
    /// generation is a no-op. Returns `true` if the entry was removed.
    pub fn release(&self, session_id: &SessionId, generation: u64) -> bool {
        match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(mut entry) if entry.get().generation == generation => {
                let remaining = {
                    let channel = entry.get_mut();
                    channel.subscribers = channel.subscribers.saturating_sub(1);
                    channel.subscribers
                };

                if remaining == 0 {
                    entry.remove();
                    info!("Unregistered event channel for session {session_id}");
                    true
                } else {
                    debug!("Session {session_id} still has {remaining} subscriber(s)");
                    false
                }
            }
            _ => {
                debug!("Ignoring stale release for session {session_id} (generation {generation})");
                false
            }
        }
    }

    /// Remove a session's channel regardless of its subscribers.
    /// Returns `true` if an entry was removed.
    pub fn unregister(&self, session_id: &SessionId) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!("Unregistered event channel for session {session_id}");
        }
        removed
    }

    /// Send an event to one session's private channel.
    ///
    /// Returns `false` if the session is not registered. A registered
    /// session with no live receiver silently drops the event.
    pub fn send_to_session(&self, session_id: &SessionId, event: Event) -> bool {
        match self.sessions.get(session_id) {
            Some(channel) => {
                if channel.sender.send(event).is_err() {
                    debug!("Session {session_id} has no active receiver, event dropped");
                }
                true
            }
            None => false,
        }
    }

    /// Number of live receivers on a session's private channel.
    pub fn receiver_count(&self, session_id: &SessionId) -> Option<usize> {
        self.sessions
            .get(session_id)
            .map(|channel| channel.sender.receiver_count())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SESSION_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_get_or_create() {
        let registry = SessionRegistry::default();
        let id = SessionId::from("s1");

        let first = registry.register(&id);
        let _rx = first.sender.subscribe();
        let second = registry.register(&id);

        assert_eq!(registry.len(), 1);
        assert!(
            first.sender.same_channel(&second.sender),
            "registering twice must reuse the existing channel"
        );
        assert_eq!(first.generation, second.generation);
    }

    #[test]
    fn test_release_removes_entry_after_last_subscriber() {
        let registry = SessionRegistry::default();
        let id = SessionId::from("s1");
        let first = registry.register(&id);
        let second = registry.register(&id);

        assert!(!registry.release(&id, first.generation));
        assert!(registry.is_registered(&id), "one subscriber is still attached");
        assert!(registry.release(&id, second.generation));
        assert!(!registry.is_registered(&id));
    }

    #[test]
    fn test_stale_release_keeps_newer_entry() {
        let registry = SessionRegistry::default();
        let id = SessionId::from("s1");
        let old = registry.register(&id);
        assert!(registry.unregister(&id));

        let new = registry.register(&id);
        assert_ne!(old.generation, new.generation);
        assert!(!registry.is_current(&id, old.generation));

        assert!(!registry.release(&id, old.generation));
        assert!(registry.is_current(&id, new.generation));
    }

    #[test]
    fn test_unregister_removes_entry_once() {
        let registry = SessionRegistry::default();
        let id = SessionId::from("s1");
        registry.register(&id);

        assert!(registry.is_registered(&id));
        assert!(registry.unregister(&id));
        assert!(!registry.is_registered(&id));
        assert!(!registry.unregister(&id), "second removal is a no-op");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_to_unknown_session_reports_false() {
        let registry = SessionRegistry::default();
        assert!(!registry.send_to_session(&SessionId::from("ghost"), Event::Heartbeat));
    }

    #[test]
    fn test_send_to_registered_session_reaches_receiver() {
        let registry = SessionRegistry::default();
        let id = SessionId::from("s1");
        let mut rx = registry.register(&id).sender.subscribe();

        assert!(registry.send_to_session(&id, Event::Heartbeat));
        assert_eq!(rx.try_recv().unwrap(), Event::Heartbeat);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let registry = SessionRegistry::new(0);
        let id = SessionId::from("s1");
        let mut rx = registry.register(&id).sender.subscribe();
        registry.send_to_session(&id, Event::Heartbeat);
        assert_eq!(rx.try_recv().unwrap(), Event::Heartbeat);
    }

    #[test]
    fn test_receiver_count_tracks_subscribers() {
        let registry = SessionRegistry::default();
        let id = SessionId::from("s1");
        assert_eq!(registry.receiver_count(&id), None);

        let rx1 = registry.register(&id).sender.subscribe();
        let _rx2 = registry.register(&id).sender.subscribe();
        assert_eq!(registry.receiver_count(&id), Some(2));

        drop(rx1);
        assert_eq!(registry.receiver_count(&id), Some(1));
    }
}
