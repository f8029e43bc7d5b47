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

//! Capability-token middleware.
//!
//! Producers and workers present different bearer tokens. A producer token
//! never opens worker routes and the reverse.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::AppState;

/// The caller classes that gate the job routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Producer,
    Worker,
}

pub async fn require_producer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, Capability::Producer, req, next).await
}

pub async fn require_worker(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, Capability::Worker, req, next).await
}

async fn authorize(
    state: &AppState,
    capability: Capability,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers()).ok_or(ApiError::Unauthorized)?;

    let expected = match capability {
        Capability::Producer => state.tokens.producer.as_str(),
        Capability::Worker => state.tokens.worker.as_str(),
    };

    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        tracing::debug!(?capability, path = %req.uri().path(), "Rejected bearer token");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();

    (!token.is_empty()).then_some(token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
