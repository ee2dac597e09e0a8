use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use constant_time_eq::constant_time_eq;
use serde_json::json;

use crate::AppState;

/// Axum middleware guarding the admin routes with `Authorization: Bearer <api_key>`.
/// Without a configured HUSH_API_KEY the admin routes are closed entirely.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.api_key else {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "admin endpoints are disabled — set HUSH_API_KEY to enable them"})),
        )
            .into_response();
    };

    let token = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(t) if constant_time_eq(t.as_bytes(), expected.as_bytes()) => {
            next.run(request).await
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized — valid HUSH_API_KEY required for this endpoint"})),
        )
            .into_response(),
    }
}
