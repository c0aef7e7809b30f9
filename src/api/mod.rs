// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::{FileAccount, FileInfo, StorageInfo},
    error::ErrorBody,
    models::{
        ConnectRequest, DownloadResponse, FileListResponse, InitializeResponse, SessionResponse,
        ShareRequest, SignatureResponse, StorageResponse, UploadResponse,
    },
    projection::StorageStats,
    session::{FileRecord, SessionState},
    state::AppState,
};

pub mod files;
pub mod health;
pub mod session;
pub mod storage;

pub fn router(state: AppState) -> Router {
    // Uploads are raw bodies, so the body limit is the file size limit.
    let body_limit =
        usize::try_from(state.session.config().limits.max_file_size).unwrap_or(usize::MAX);

    let v1_routes = Router::new()
        .route("/session", get(session::get_session))
        .route("/session/connect", post(session::connect))
        .route("/session/disconnect", post(session::disconnect))
        .route("/session/refresh", post(session::refresh))
        .route("/storage", get(storage::get_storage))
        .route("/storage/initialize", post(storage::initialize_storage))
        .route(
            "/files",
            get(files::list_files)
                .post(files::upload_file)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/files/{address}", delete(files::delete_file))
        .route("/files/{address}/share", put(files::share_file))
        .route("/files/{address}/download", post(files::download_file))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        session::get_session,
        session::connect,
        session::disconnect,
        session::refresh,
        storage::initialize_storage,
        storage::get_storage,
        files::list_files,
        files::upload_file,
        files::delete_file,
        files::share_file,
        files::download_file
    ),
    components(
        schemas(
            ConnectRequest,
            SessionResponse,
            SessionState,
            InitializeResponse,
            StorageResponse,
            StorageInfo,
            StorageStats,
            FileRecord,
            FileAccount,
            FileInfo,
            FileListResponse,
            UploadResponse,
            ShareRequest,
            SignatureResponse,
            DownloadResponse,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and session overview"),
        (name = "Session", description = "Wallet connection"),
        (name = "Storage", description = "Per-owner storage account"),
        (name = "Files", description = "Upload, share, download and delete")
    )
)]
struct ApiDoc;
