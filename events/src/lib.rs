//! Domain event infrastructure for the push events platform.
//!
//! This crate lets computations that run outside of a client connection
//! (background tasks, session management) announce that something happened
//! without knowing anything about how clients are notified.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events in the system
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates (sse, web, etc.),
//! avoiding circular dependencies. The `sse` crate registers a handler that
//! routes these events onto the client event bus.

use async_trait::async_trait;
use std::sync::Arc;

/// Opaque identifier of one logical client session, as issued by the auth layer.
pub type SessionId = String;

/// Domain events that represent business-level changes in the system.
/// These events are emitted by the computation that owns the change, once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// Emitted exactly once when an asynchronous task started on behalf of a
    /// session has completed. Only that session is notified.
    TaskCompleted {
        /// Session that submitted the task and should be told about it.
        session_id: SessionId,
        /// Opaque id the client uses to correlate the notification with its request.
        correlation_id: String,
    },
    /// Emitted when a session's live event stream must be torn down from the
    /// outside (e.g. an administrator forcing the session off).
    SessionRevoked { session_id: SessionId },
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers, in registration order.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
