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

//! Banner, health, metrics and log tail.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{json_error, ApiError};
use crate::logs::{self, DEFAULT_TAIL_LINES};
use crate::AppState;

pub async fn index() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "hopper",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /jobs",
            "GET /jobs",
            "GET /jobs/{id}",
            "POST /jobs/claim",
            "POST /jobs/{id}/progress",
            "POST /jobs/{id}/complete",
            "POST /jobs/{id}/fail",
            "GET /logs",
            "GET /health",
            "GET /metrics",
        ],
    }))
}

/// Reports database reachability and job counts per status.
pub async fn health(State(state): State<AppState>) -> Response {
    let backend = state.dal.backend().name();

    let counts = match state.dal.database().ping().await {
        Ok(()) => state.dal.jobs().count_by_status(None).await,
        Err(e) => Err(e),
    };

    match counts {
        Ok(counts) => Json(json!({
            "ok": true,
            "backend": backend,
            "jobs": counts,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "ok": false,
                    "backend": backend,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => json_error(
            StatusCode::NOT_FOUND,
            "metrics_disabled",
            "no metrics recorder is installed",
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub lines: Option<usize>,
    pub level: Option<String>,
}

/// `GET /logs?lines=&level=` → `{"logs": [...]}`
pub async fn tail_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = state.log_file.clone().ok_or(ApiError::Unavailable(
        "logs_disabled",
        "no log file is configured".to_string(),
    ))?;
    let lines = query.lines.unwrap_or(DEFAULT_TAIL_LINES);

    let tail = tokio::task::spawn_blocking(move || {
        logs::tail_file(&path, lines, query.level.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("log reader task failed: {}", e)))?
    .map_err(|e| ApiError::Internal(format!("cannot read log file: {}", e)))?;

    Ok(Json(json!({ "logs": tail })))
}
