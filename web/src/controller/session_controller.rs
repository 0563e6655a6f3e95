use crate::controller::ApiResponse;
use crate::extractors::authenticated_session::AuthenticatedSession;
use crate::extractors::SESSION_COOKIE;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use log::*;
use serde_json::json;
use service::AppState;

/// Starts a new session and returns its id, also as a session cookie, e.g.:
/// set-cookie: id=07bbbe54-bd35-425f-8e63-618a8d8612df; HttpOnly; SameSite=Strict; Path=/
///
/// Pass the id back on every call, either as that cookie or in the
/// `x-session-id` header:
/// curl -N --header "Cookie: id=07bbbe54-bd35-425f-8e63-618a8d8612df" http://localhost:4000/events
pub async fn create(State(app_state): State<AppState>) -> impl IntoResponse {
    let session_id = app_state.sessions.create();
    let cookie = format!("{SESSION_COOKIE}={session_id}; HttpOnly; SameSite=Strict; Path=/");

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::new(
            StatusCode::OK.into(),
            json!({ "session_id": session_id.as_str() }),
        )),
    )
}

/// Logs the session out. Its open event stream, if any, receives a
/// `LoggedOut` event on its next auth-checked event and then closes.
/// curl -v --header "Cookie: id=07bbbe54-bd35-425f-8e63-618a8d8612df" --request DELETE http://localhost:4000/sessions
pub async fn delete(
    AuthenticatedSession(session_id): AuthenticatedSession,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    trace!("SessionController::delete()");
    app_state.sessions.invalidate(&session_id);
    StatusCode::NO_CONTENT
}
