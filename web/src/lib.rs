//! HTTP surface for the push events service.
//!
//! Session handshake, logout, task submission and the `/events` stream.
//! Authentication is a plain in-memory session store (see
//! `service::sessions`): a session id travels in the `id` cookie or the
//! `x-session-id` header.

use log::*;
use service::AppState;
use std::future::Future;
use tokio::net::TcpListener;

mod controller;
mod extractors;
pub mod router;
mod sse;

/// Bind the configured interface and port and serve until `shutdown` resolves.
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let host = app_state.config.interface().to_string();
    let port = app_state.config.port;

    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!("Server starting... listening for connections on http://{host}:{port}");

    let app = router::define_routes(app_state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
