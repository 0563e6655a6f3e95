use crate::message::{Event as SseEvent, Message as SseMessage, MessageScope, SessionId};
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Handles domain events by turning them into event bus operations.
///
/// This handler is responsible for:
/// 1. Converting task completions into a `TaskReady` event for the one
///    session that submitted the task
/// 2. Removing revoked sessions from the registry so their live streams end
///
/// The computation that finishes a task only knows about `DomainEvent`;
/// this handler is the only coupling between it and connected clients.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::TaskCompleted {
                session_id,
                correlation_id,
            } => {
                debug!(
                    "Handling TaskCompleted event {} for session {}",
                    correlation_id, session_id
                );

                self.sse_manager.send_message(SseMessage {
                    event: SseEvent::TaskReady {
                        correlation_id: correlation_id.clone(),
                    },
                    scope: MessageScope::Session {
                        session_id: SessionId::from(session_id.as_str()),
                    },
                });
            }

            DomainEvent::SessionRevoked { session_id } => {
                debug!("Handling SessionRevoked event for session {}", session_id);

                if !self
                    .sse_manager
                    .unsubscribe(&SessionId::from(session_id.as_str()))
                {
                    debug!("Session {} had no open event stream", session_id);
                }
            }
        }
    }
}
