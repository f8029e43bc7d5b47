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

//! Worker routes: claim, progress and the two terminal transitions.
//!
//! All bodies are optional JSON; omitted fields fall back to the defaults
//! below.

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hopper::{JobId, ProgressUpdate};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{job_id, json_body};
use crate::error::ApiError;
use crate::AppState;

/// Worker id recorded when a claim does not name one.
pub const ANONYMOUS_WORKER: &str = "worker-unknown";

/// Failure detail stored when a worker gives none.
pub const UNKNOWN_ERROR: &str = "unknown error";

#[derive(Debug, Default, Deserialize)]
pub struct ClaimRequest {
    pub queue: Option<String>,
    pub worker_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    pub result: Option<Value>,
}

/// `error` may be a string or any structured JSON value.
#[derive(Debug, Default, Deserialize)]
pub struct FailRequest {
    pub error: Option<Value>,
}

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// `POST /jobs/claim` → `200` with the job, or `204` when the queue is empty.
pub async fn claim_job(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: ClaimRequest = json_body(&body)?;
    let queue = request
        .queue
        .unwrap_or_else(|| state.jobs.default_queue.clone());
    let worker_id = request
        .worker_id
        .unwrap_or_else(|| ANONYMOUS_WORKER.to_string());

    match state.dal.jobs().claim(&queue, &worker_id).await? {
        Some(job) => Ok(Json(job).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn report_progress(
    State(state): State<AppState>,
    path: Result<Path<JobId>, PathRejection>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let id = job_id(path)?;
    let update: ProgressUpdate = json_body(&body)?;
    state.dal.jobs().report_progress(id, update).await?;
    Ok(ok())
}

pub async fn complete_job(
    State(state): State<AppState>,
    path: Result<Path<JobId>, PathRejection>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let id = job_id(path)?;
    let request: CompleteRequest = json_body(&body)?;
    let result = request.result.unwrap_or_else(|| json!({}));
    state.dal.jobs().complete(id, result).await?;
    Ok(ok())
}

pub async fn fail_job(
    State(state): State<AppState>,
    path: Result<Path<JobId>, PathRejection>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let id = job_id(path)?;
    let request: FailRequest = json_body(&body)?;
    let detail = request.error.unwrap_or_else(|| json!(UNKNOWN_ERROR));
    state.dal.jobs().fail(id, detail).await?;
    Ok(ok())
}
