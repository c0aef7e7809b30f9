// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::{ApiError, ErrorBody},
    models::{InitializeResponse, StorageResponse},
    projection::format_bytes,
    session::InitializeOutcome,
    state::AppState,
};

/// Create the connected owner's storage account.
///
/// Returns 201 when the account was created and 200 when it already existed.
#[utoipa::path(
    post,
    path = "/v1/storage/initialize",
    tag = "Storage",
    responses(
        (status = 201, description = "Storage created", body = InitializeResponse),
        (status = 200, description = "Storage already initialized", body = InitializeResponse),
        (status = 409, description = "No wallet connected", body = ErrorBody)
    )
)]
pub async fn initialize_storage(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<InitializeResponse>), ApiError> {
    let outcome = state.session.initialize_storage().await?;
    let status = match outcome {
        InitializeOutcome::Created(_) => StatusCode::CREATED,
        InitializeOutcome::AlreadyInitialized => StatusCode::OK,
    };
    Ok((status, Json(outcome.into())))
}

/// Storage totals as recorded on the ledger, with the derived statistics.
#[utoipa::path(
    get,
    path = "/v1/storage",
    tag = "Storage",
    responses(
        (status = 200, body = StorageResponse),
        (status = 409, description = "No wallet connected", body = ErrorBody)
    )
)]
pub async fn get_storage(State(state): State<AppState>) -> Result<Json<StorageResponse>, ApiError> {
    let storage_info = state.session.refresh_storage_info().await?;
    let stats = state.session.stats();
    Ok(Json(StorageResponse {
        storage_info,
        stats,
        total_size: format_bytes(stats.total_bytes),
    }))
}
