pub(crate) mod authenticated_session;

use axum::http::StatusCode;

/// Header carrying the session id for clients that cannot send cookies.
pub(crate) const SESSION_ID_HEADER: &str = "x-session-id";

/// Cookie carrying the session id.
pub(crate) const SESSION_COOKIE: &str = "id";

type RejectionType = (StatusCode, String);
