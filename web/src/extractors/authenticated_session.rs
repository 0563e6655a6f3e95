use crate::extractors::{RejectionType, SESSION_COOKIE, SESSION_ID_HEADER};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use log::*;
use service::AppState;
use sse::SessionId;

pub(crate) struct AuthenticatedSession(pub SessionId);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedSession {
    type Rejection = RejectionType;

    // Reads the session id from the `x-session-id` header or the `id` cookie
    // and accepts it only if the session store still considers it valid.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session_id = session_id_from_headers(&parts.headers)
            .ok_or_else(|| (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()))?;

        if state.sessions.is_valid(&session_id) {
            Ok(AuthenticatedSession(session_id))
        } else {
            debug!("Rejecting request for unknown or expired session {session_id}");
            Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()))
        }
    }
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    if let Some(value) = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        return Some(SessionId::from(value.trim()));
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| SessionId::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; id=abc-123; other=1"),
        );
        assert_eq!(
            session_id_from_headers(&headers),
            Some(SessionId::from("abc-123"))
        );
    }

    #[test]
    fn test_header_takes_precedence_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("id=from-cookie"));
        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(
            session_id_from_headers(&headers),
            Some(SessionId::from("from-header"))
        );
    }

    #[test]
    fn test_missing_session_id() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("identity=nope"));
        assert_eq!(session_id_from_headers(&headers), None);
    }
}
