/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! HTTP error responses.
//!
//! Every error leaves the server as `{"error": <code>, "message": <text>}`.
//! Storage failures are logged in full and reported generically.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hopper::JobError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Missing, malformed or wrong capability token.
    Unauthorized,
    /// The request could not be decoded.
    BadRequest(String),
    /// Requested feature is not configured on this server.
    Unavailable(&'static str, String),
    /// A server-side failure outside the job store, such as an unreadable log file.
    Internal(String),
    Job(JobError),
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        ApiError::Job(err)
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn job_error_to_response(err: JobError) -> Response {
    match &err {
        JobError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        JobError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        JobError::InvalidTransition { .. } => {
            json_error(StatusCode::CONFLICT, "invalid_transition", err.to_string())
        }
        JobError::ConcurrencyConflict { .. } => {
            json_error(StatusCode::CONFLICT, "conflict", err.to_string())
        }
        JobError::Database(_) | JobError::ConnectionPool(_) | JobError::CorruptRecord { .. } => {
            tracing::error!("Storage failure: {}", err);
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence_error",
                "the job store could not complete the request",
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => json_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid bearer token",
            ),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unavailable(code, msg) => json_error(StatusCode::NOT_FOUND, code, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Request failed: {}", msg);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::Job(err) => job_error_to_response(err),
        }
    }
}
