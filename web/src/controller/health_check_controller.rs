use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET the liveness of the HTTP server
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}
