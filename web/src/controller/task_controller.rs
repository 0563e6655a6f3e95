use crate::controller::ApiResponse;
use crate::extractors::authenticated_session::AuthenticatedSession;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use events::DomainEvent;
use log::*;
use serde::Deserialize;
use serde_json::json;
use service::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateParams {
    /// Client-chosen id echoed back in the `TaskReady` event. Generated when absent.
    pub correlation_id: Option<String>,
}

/// Submits a background task for the calling session.
///
/// The task runs detached from the request; on completion it announces
/// itself with a `TaskCompleted` domain event, which reaches only this
/// session's event stream as `TaskReady`.
pub async fn create(
    AuthenticatedSession(session_id): AuthenticatedSession,
    State(app_state): State<AppState>,
    params: Option<Json<CreateParams>>,
) -> Response {
    let params = params.map(|Json(params)| params).unwrap_or_default();
    if let Some(id) = params.correlation_id.as_deref() {
        if !is_valid_correlation_id(id) {
            debug!("Rejecting task with invalid correlation id {id:?} for session {session_id}");
            return (
                StatusCode::BAD_REQUEST,
                "correlation_id must be non-empty and free of control characters",
            )
                .into_response();
        }
    }
    let correlation_id = params
        .correlation_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    debug!("Accepted task {correlation_id} for session {session_id}");

    let delay = app_state.config.task_completion_delay();
    let publisher = app_state.event_publisher.clone();
    let event = DomainEvent::TaskCompleted {
        session_id: session_id.to_string(),
        correlation_id: correlation_id.clone(),
    };
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        publisher.publish(event).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            StatusCode::ACCEPTED.into(),
            json!({ "correlation_id": correlation_id }),
        )),
    )
        .into_response()
}

// The id is echoed verbatim as an SSE data line.
fn is_valid_correlation_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(char::is_control)
}
