//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handlers for the `/events` endpoint.
//! The event bus, delivery pipeline and event types live in the `sse`
//! crate.

pub mod handler;
