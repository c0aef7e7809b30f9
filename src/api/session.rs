// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    error::{ApiError, ErrorBody},
    models::{ConnectRequest, SessionResponse},
    state::AppState,
};

/// Current session state without touching the ledger.
#[utoipa::path(
    get,
    path = "/v1/session",
    tag = "Session",
    responses((status = 200, body = SessionResponse))
)]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(state.session.snapshot().into())
}

/// Connect a wallet and load its storage.
#[utoipa::path(
    post,
    path = "/v1/session/connect",
    request_body = ConnectRequest,
    tag = "Session",
    responses(
        (status = 200, body = SessionResponse),
        (status = 502, description = "Ledger unreachable", body = ErrorBody),
        (status = 504, description = "Ledger timed out", body = ErrorBody)
    )
)]
pub async fn connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    state.session.connect(request.owner).await?;
    Ok(Json(state.session.snapshot().into()))
}

#[utoipa::path(
    post,
    path = "/v1/session/disconnect",
    tag = "Session",
    responses((status = 200, body = SessionResponse))
)]
pub async fn disconnect(State(state): State<AppState>) -> Json<SessionResponse> {
    state.session.disconnect().await;
    Json(state.session.snapshot().into())
}

/// Re-fetch storage totals and files from the ledger.
#[utoipa::path(
    post,
    path = "/v1/session/refresh",
    tag = "Session",
    responses(
        (status = 200, body = SessionResponse),
        (status = 409, description = "No wallet connected", body = ErrorBody)
    )
)]
pub async fn refresh(State(state): State<AppState>) -> Result<Json<SessionResponse>, ApiError> {
    let snapshot = state.session.refresh().await?;
    Ok(Json(snapshot.into()))
}
