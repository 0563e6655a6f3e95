//! Server-Sent Events (SSE) push infrastructure.
//!
//! This crate multiplexes several independently produced event streams into
//! one ordered delivery channel per connected client session.
//!
//! # Architecture
//!
//! - **Global bus**: one process-wide broadcast channel for events every
//!   session receives (heartbeats, version changes).
//! - **Session registry**: one private broadcast channel per session for
//!   targeted events (task completions). The presence of a registry entry is
//!   the session's liveness flag.
//! - **Merged subscription**: `Manager::subscribe` returns a stream that
//!   interleaves both channels and ends once its registry entry is gone.
//! - **Lossy delivery**: every channel is bounded. A receiver that falls
//!   behind loses its oldest buffered events, nothing is replayed.
//! - **Delivery pipeline**: re-checks auth before auth-sensitive events,
//!   hands each event to the transport, and stops on the first transport or
//!   auth failure. Auth failure writes exactly one `LoggedOut` event.
//!
//! # Event Flow
//!
//! 1. A connection is authenticated by the transport layer
//! 2. The transport calls `Manager::subscribe(session_id)`
//! 3. `Pipeline::run` consumes the merged stream, writing through an
//!    `EventSender` and consulting an `AuthChecker`
//! 4. Producers (`HeartbeatSource`, `VersionSource`) publish globally; task
//!    completions arrive as `DomainEvent`s and are routed to one session by
//!    `SseDomainEventHandler`
//! 5. When the pipeline ends, the transport calls `Unsubscribe::unsubscribe`
//!
//! # Example: running a connection
//!
//! ```rust,ignore
//! let (events, unsubscribe) = manager.subscribe(session_id.clone()).into_parts();
//! let state = Pipeline::new(session_id, auth_checker, sender).run(events).await;
//! unsubscribe.unsubscribe();
//! ```
//!
//! # Modules
//!
//! - `message`: event variants, wire framing and routing scopes
//! - `registry`: per-session channel registry
//! - `manager`: the event bus (publish and subscribe)
//! - `subscription`: merged per-session stream and unsubscribe handle
//! - `pipeline`: per-connection delivery and termination
//! - `producer`: heartbeat and version-change sources
//! - `domain_event_handler`: bridge from `events::DomainEvent` to the bus

pub mod domain_event_handler;
pub mod error;
pub mod manager;
pub mod message;
pub mod pipeline;
pub mod producer;
pub mod registry;
pub mod subscription;

pub use error::Error;
pub use manager::Manager;
pub use message::{Event, EventType, SessionId, VersionMeta};
pub use pipeline::{AuthChecker, DeliveryState, EventSender, Outcome, Pipeline, PipelineOptions};
pub use subscription::{EventStream, Subscription, Unsubscribe};

/// Default number of events buffered per receiver on the global channel.
pub const DEFAULT_GLOBAL_CHANNEL_CAPACITY: usize = 64;
/// Default number of events buffered per receiver on a session's channel.
pub const DEFAULT_SESSION_CHANNEL_CAPACITY: usize = 64;
