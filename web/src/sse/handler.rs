use crate::extractors::authenticated_session::AuthenticatedSession;
use async_stream::stream;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use events::DomainEvent;
use futures::Stream;
use log::*;
use service::AppState;
use sse::{EventSender, Pipeline};
use std::convert::Infallible;
use tokio::sync::mpsc;

/// Writes pipeline events into the channel backing the SSE response body.
/// Fails once the body has been dropped, i.e. the client went away.
struct ChannelSender {
    tx: mpsc::Sender<Event>,
}

#[async_trait]
impl EventSender for ChannelSender {
    async fn send(&mut self, event: &sse::Event) -> bool {
        self.tx.send(Event::from(event)).await.is_ok()
    }
}

/// SSE handler that establishes a long-lived event stream for an authenticated session.
///
/// The delivery pipeline runs on its own task and feeds the response body
/// through a single-slot channel, so a slow client holds the pipeline back
/// while the bus keeps dropping that client's oldest events.
pub(crate) async fn sse_handler(
    AuthenticatedSession(session_id): AuthenticatedSession,
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Establishing SSE connection for session {session_id}");

    let (tx, mut rx) = mpsc::channel(1);
    let (events, unsubscribe) = app_state
        .sse_manager
        .subscribe(session_id.clone())
        .into_parts();

    let pipeline = Pipeline::new(
        session_id.clone(),
        app_state.sessions.clone(),
        ChannelSender { tx },
    )
    .with_options(app_state.config.pipeline_options());

    let pipeline_unsubscribe = unsubscribe.clone();
    tokio::spawn(async move {
        pipeline.run(events).await;
        pipeline_unsubscribe.unsubscribe();
    });

    let stream = stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<_, Infallible>(event);
        }

        // Pipeline finished, clean up before the response ends
        debug!("SSE connection closed for session {session_id}, cleaning up");
        unsubscribe.unsubscribe();
    };

    Sse::new(stream)
}

/// Closes the caller's event stream without logging the session out.
pub(crate) async fn close_stream(
    AuthenticatedSession(session_id): AuthenticatedSession,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    app_state
        .event_publisher
        .publish(DomainEvent::SessionRevoked {
            session_id: session_id.to_string(),
        })
        .await;

    StatusCode::NO_CONTENT
}
