use crate::message::{Event, EventType, Message, MessageScope, SessionId};
use crate::registry::SessionRegistry;
use crate::subscription::{merged_stream, Subscription, Unsubscribe};
use log::*;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Process-wide event bus.
///
/// Owns the global broadcast channel and the registry of per-session
/// channels. Producers only ever talk to the bus through `publish_*`;
/// connections only through `subscribe` and the returned `Unsubscribe`.
pub struct Manager {
    registry: Arc<SessionRegistry>,
    global: broadcast::Sender<Event>,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_capacity(
            crate::DEFAULT_GLOBAL_CHANNEL_CAPACITY,
            crate::DEFAULT_SESSION_CHANNEL_CAPACITY,
        )
    }

    /// Create a bus with explicit per-receiver buffer sizes. Each receiver
    /// that falls further behind than its buffer loses the oldest events.
    pub fn with_capacity(global_capacity: usize, session_capacity: usize) -> Self {
        let (global, _) = broadcast::channel(global_capacity.max(1));
        Self {
            registry: Arc::new(SessionRegistry::new(session_capacity)),
            global,
        }
    }

    /// Deliver an event to every currently subscribed session.
    pub fn publish_global(&self, event: Event) {
        let event_type = event.event_type();
        match self.global.send(event) {
            Ok(receivers) => trace!("Published {event_type} to {receivers} subscriber(s)"),
            Err(_) => trace!("Published {event_type} with no subscribers, dropped"),
        }
    }

    /// Deliver an event to one session only. Unknown sessions are a no-op.
    pub fn publish_to_session(&self, session_id: &SessionId, event: Event) {
        let event_type = event.event_type();
        if self.registry.send_to_session(session_id, event) {
            debug!("Published {event_type} to session {session_id}");
        } else {
            warn!("Dropping {event_type} for unregistered session {session_id}");
        }
    }

    /// Send a message based on its scope
    pub fn send_message(&self, message: Message) {
        match message.scope {
            MessageScope::Session { session_id } => {
                self.publish_to_session(&session_id, message.event);
            }
            MessageScope::Broadcast => {
                self.publish_global(message.event);
            }
        }
    }

    /// Subscribe a session, creating its private channel if needed.
    ///
    /// Receivers are attached before this returns, so anything published
    /// afterwards is observed by the stream. Nothing published earlier is.
    pub fn subscribe(&self, session_id: SessionId) -> Subscription {
        let registration = self.registry.register(&session_id);
        let private = registration.sender.subscribe();
        let global = self.global.subscribe();
        debug!("Subscribed session {session_id} to the event bus");

        let unsubscribe = Unsubscribe::new(
            session_id.clone(),
            registration.generation,
            Arc::clone(&self.registry),
        );
        let stream = merged_stream(unsubscribe.clone(), global, private);

        Subscription {
            session_id,
            stream,
            unsubscribe,
        }
    }

    /// Remove a session from the outside, e.g. on forced logout. Every
    /// stream subscribed to it terminates when it observes its next event.
    pub fn unsubscribe(&self, session_id: &SessionId) -> bool {
        self.registry.unregister(session_id)
    }

    pub fn is_registered(&self, session_id: &SessionId) -> bool {
        self.registry.is_registered(session_id)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
