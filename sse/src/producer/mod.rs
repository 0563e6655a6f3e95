//! Background tasks that feed the event bus.
//!
//! Each producer runs on its own task until its `CancellationToken` fires.
//! Task completion notifications have no producer loop of their own: the
//! computation that finishes publishes straight onto the bus (see
//! [`crate::domain_event_handler`]).

pub mod heartbeat;
pub mod version;

pub use heartbeat::HeartbeatSource;
pub use version::{
    HttpVersionProvider, StaticVersionProvider, VersionProvider, VersionSource, VersionWatcher,
};
