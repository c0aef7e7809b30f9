// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    blockchain::Pubkey,
    error::{ApiError, ErrorBody},
    models::{
        DownloadResponse, FileListResponse, ShareRequest, SignatureResponse, UploadQuery,
        UploadResponse,
    },
    state::AppState,
};

fn parse_address(raw: &str) -> Result<Pubkey, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::bad_request(format!("invalid file address {raw:?}: {e}")))
}

#[utoipa::path(
    get,
    path = "/v1/files",
    tag = "Files",
    responses(
        (status = 200, body = FileListResponse),
        (status = 409, description = "No wallet connected", body = ErrorBody)
    )
)]
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>, ApiError> {
    let files = state.session.list_files().await?;
    Ok(Json(FileListResponse { files }))
}

/// Upload the raw request body as a file.
#[utoipa::path(
    post,
    path = "/v1/files",
    params(UploadQuery),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    tag = "Files",
    responses(
        (status = 201, body = UploadResponse),
        (status = 400, description = "Invalid name, size or key", body = ErrorBody),
        (status = 409, description = "Duplicate content or no wallet", body = ErrorBody),
        (status = 502, description = "Pinning or ledger failure", body = ErrorBody)
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let receipt = state
        .session
        .upload_file(&query.name, &body, query.encryption_key.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse::new(receipt, &state.network)),
    ))
}

#[utoipa::path(
    delete,
    path = "/v1/files/{address}",
    params(
        ("address" = String, Path, description = "File account address")
    ),
    tag = "Files",
    responses(
        (status = 200, body = SignatureResponse),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "No such file", body = ErrorBody)
    )
)]
pub async fn delete_file(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SignatureResponse>, ApiError> {
    let address = parse_address(&address)?;
    let signature = state.session.delete_file(&address).await?;
    Ok(Json(SignatureResponse::new(signature, &state.network)))
}

#[utoipa::path(
    put,
    path = "/v1/files/{address}/share",
    params(
        ("address" = String, Path, description = "File account address")
    ),
    request_body = ShareRequest,
    tag = "Files",
    responses(
        (status = 200, body = SignatureResponse),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "No such file", body = ErrorBody)
    )
)]
pub async fn share_file(
    Path(address): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ShareRequest>,
) -> Result<Json<SignatureResponse>, ApiError> {
    let address = parse_address(&address)?;
    let signature = state
        .session
        .share_file(&address, request.is_public)
        .await?;
    Ok(Json(SignatureResponse::new(signature, &state.network)))
}

/// Record an access and return the retrieval link.
#[utoipa::path(
    post,
    path = "/v1/files/{address}/download",
    params(
        ("address" = String, Path, description = "File account address")
    ),
    tag = "Files",
    responses(
        (status = 200, body = DownloadResponse),
        (status = 403, description = "Private file of another owner", body = ErrorBody),
        (status = 404, description = "No such file", body = ErrorBody)
    )
)]
pub async fn download_file(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let address = parse_address(&address)?;
    let ticket = state.session.download_file(&address).await?;
    Ok(Json(ticket.into()))
}
