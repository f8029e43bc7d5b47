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

//! Producer routes: create, list and read jobs.

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hopper::{Job, JobFilter, JobId, JobStatus, NewJob};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{job_id, json_body};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateJobRequest {
    pub queue: Option<String>,
    pub owner: Option<String>,
    pub payload: Option<Value>,
    pub max_retries: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub queue: Option<String>,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

impl ListJobsQuery {
    fn into_filter(self) -> Result<JobFilter, ApiError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<JobStatus>)
            .transpose()
            .map_err(ApiError::BadRequest)?;

        Ok(JobFilter {
            queue: self.queue,
            owner: self.owner,
            status,
            limit: self.limit,
        })
    }
}

/// `POST /jobs` → `201 {"ok": true, "id": ...}`
pub async fn create_job(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreateJobRequest = json_body(&body)?;

    let payload = request
        .payload
        .ok_or_else(|| ApiError::BadRequest("payload is required".to_string()))?;
    let queue = request
        .queue
        .unwrap_or_else(|| state.jobs.default_queue.clone());

    let mut new_job = NewJob::new(queue, payload)
        .with_max_retries(request.max_retries.unwrap_or(state.jobs.default_max_retries));
    if let Some(owner) = request.owner {
        new_job = new_job.with_owner(owner);
    }

    let job = state.dal.jobs().create(new_job).await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "id": job.id }))))
}

/// `GET /jobs?queue=&owner=&status=&limit=`, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let jobs = state.dal.jobs().list(query.into_filter()?).await?;
    Ok(Json(jobs))
}

pub async fn get_job(
    State(state): State<AppState>,
    path: Result<Path<JobId>, PathRejection>,
) -> Result<Json<Job>, ApiError> {
    let id = job_id(path)?;
    Ok(Json(state.dal.jobs().get(id).await?))
}
