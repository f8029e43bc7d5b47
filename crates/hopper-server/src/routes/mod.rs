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

//! Route table and request body helpers.

pub mod jobs;
pub mod system;
pub mod worker;

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::Path;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use hopper::JobId;
use serde::de::DeserializeOwned;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{require_producer, require_worker};
use crate::error::ApiError;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let producer = Router::new()
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/logs", get(system::tail_logs))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_producer,
        ));

    let worker = Router::new()
        .route("/jobs/claim", post(worker::claim_job))
        .route("/jobs/{id}/progress", post(worker::report_progress))
        .route("/jobs/{id}/complete", post(worker::complete_job))
        .route("/jobs/{id}/fail", post(worker::fail_job))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_worker));

    let body_limit = state.body_limit;

    Router::new()
        .route("/", get(system::index))
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .merge(producer)
        .merge(worker)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unwraps the `{id}` segment, reporting a malformed id as a JSON 400.
pub(crate) fn job_id(path: Result<Path<JobId>, PathRejection>) -> Result<JobId, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::BadRequest(format!("invalid job id: {}", e.body_text())))
}

/// Decodes a JSON body regardless of content type.
///
/// An empty body decodes to `T::default()`, so every field a route treats
/// as optional can simply be left out.
pub(crate) fn json_body<T>(body: &Bytes) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
}
