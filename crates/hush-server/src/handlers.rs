use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use zeroize::Zeroizing;

use crate::{
    secrets::{CreateError, RevealError},
    store::unix_now,
    AppState,
};

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Create ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateRequest {
    pub data: String,
    pub passphrase: String,
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub token: String,
    pub size: usize,
    pub created_at: i64,
    pub expire_at: i64,
}

pub async fn create_secret(
    State(state): State<AppState>,
    Json(body): Json<CreateRequest>,
) -> Response {
    let data = Zeroizing::new(body.data);
    let passphrase = Zeroizing::new(body.passphrase);
    let secrets = state.secrets.clone();

    let result =
        tokio::task::spawn_blocking(move || secrets.create_secret(&data, &passphrase)).await;

    match result {
        Ok(Ok(record)) => (
            StatusCode::CREATED,
            Json(CreateResponse {
                token: record.public_token(),
                size: record.size(),
                created_at: record.created_at,
                expire_at: record.expire_at(),
            }),
        )
            .into_response(),
        Ok(Err(CreateError::Validation(e))) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
        Ok(Err(CreateError::Crypto(e))) => internal_error(e.into()),
        Ok(Err(CreateError::Storage(e))) => internal_error(e),
        Err(e) => internal_error(e.into()),
    }
}

// ── Head ──────────────────────────────────────────────────────────────────────

pub async fn head_secret(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.secrets.peek(&token) {
        Ok(Some(meta)) => (
            StatusCode::OK,
            [
                (header::CACHE_CONTROL, "no-store".to_string()),
                (
                    header::HeaderName::from_static("x-hush-expires-at"),
                    meta.expire_at.to_string(),
                ),
            ],
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error(e),
    }
}

// ── Reveal ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RevealRequest {
    pub passphrase: String,
}

pub async fn reveal_secret(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<RevealRequest>,
) -> Response {
    let passphrase = Zeroizing::new(body.passphrase);
    let secrets = state.secrets.clone();

    let result =
        tokio::task::spawn_blocking(move || secrets.reveal_secret(&token, &passphrase)).await;

    let no_store = [(header::CACHE_CONTROL, "no-store")];
    match result {
        Ok(Ok(data)) => (no_store, Json(json!({ "data": data }))).into_response(),
        Ok(Err(RevealError::WrongPassphrase)) => (
            StatusCode::FORBIDDEN,
            no_store,
            Json(json!({"error": "wrong passphrase"})),
        )
            .into_response(),
        Ok(Err(RevealError::NotFound)) => (
            StatusCode::NOT_FOUND,
            no_store,
            Json(json!({"error": "not found or expired"})),
        )
            .into_response(),
        Ok(Err(RevealError::Storage(e))) => internal_error(e),
        Err(e) => internal_error(e.into()),
    }
}

// ── Admin: list ───────────────────────────────────────────────────────────────

pub async fn list_secrets(State(state): State<AppState>) -> Response {
    match state.secrets.store().list(unix_now()) {
        Ok(metas) => {
            info!(count = metas.len(), "admin: secret.list");
            Json(json!({ "secrets": metas })).into_response()
        }
        Err(e) => internal_error(e),
    }
}

// ── Admin: delete ─────────────────────────────────────────────────────────────

pub async fn delete_secret(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.secrets.delete_secret(&token) {
        Ok(true) => Json(json!({"deleted": true})).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response(),
        Err(e) => internal_error(e),
    }
}

// ── Admin: prune ──────────────────────────────────────────────────────────────

pub async fn prune_secrets(State(state): State<AppState>) -> Response {
    match state.secrets.store().prune(unix_now()) {
        Ok(n) => {
            info!(pruned = n, "admin: secret.prune");
            Json(json!({"pruned": n})).into_response()
        }
        Err(e) => internal_error(e),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn internal_error(e: anyhow::Error) -> Response {
    tracing::error!(error = %e, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal server error"})),
    )
        .into_response()
}
