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

//! # Hopper server
//!
//! HTTP front end for the [`hopper`] job queue. Producers create and read
//! jobs; workers claim them, report progress and finish them. Each side
//! authenticates with its own bearer token.
//!
//! | Route                        | Caller   |
//! |------------------------------|----------|
//! | `GET /`, `/health`, `/metrics` | anyone |
//! | `POST /jobs`, `GET /jobs`, `GET /jobs/{id}`, `GET /logs` | producer |
//! | `POST /jobs/claim`, `POST /jobs/{id}/{progress,complete,fail}` | worker |

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod logs;
pub mod routes;
pub mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use hopper::DAL;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::{HopperConfig, JobsConfig};

pub use routes::build_router;

/// The two capability tokens.
pub struct Tokens {
    pub producer: String,
    pub worker: String,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dal: DAL,
    pub tokens: Arc<Tokens>,
    pub jobs: Arc<JobsConfig>,
    pub log_file: Option<Arc<PathBuf>>,
    pub metrics: Option<PrometheusHandle>,
    pub body_limit: usize,
}

impl AppState {
    pub fn new(dal: DAL, config: &HopperConfig) -> Self {
        Self {
            dal,
            tokens: Arc::new(Tokens {
                producer: config.auth.producer_token.clone(),
                worker: config.auth.worker_token.clone(),
            }),
            jobs: Arc::new(config.jobs.clone()),
            log_file: config.logging.file.clone().map(Arc::new),
            metrics: None,
            body_limit: config.server.request_body_limit_bytes,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Builds the full router for this state.
    pub fn into_router(self) -> Router {
        build_router(self)
    }
}
