// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::session::SessionError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let status = match &e {
            SessionError::NotConnected => StatusCode::CONFLICT,
            SessionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SessionError::HashingFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SessionError::UploadFailed(_) | SessionError::RequestFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            SessionError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SessionError::AlreadyExists(_) => StatusCode::CONFLICT,
            SessionError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::Cancelled => StatusCode::CONFLICT,
        };
        if status.is_server_error() {
            tracing::warn!(error = %e, code = e.error_code(), "session operation failed");
        }
        Self::new(status, e.error_code(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}
