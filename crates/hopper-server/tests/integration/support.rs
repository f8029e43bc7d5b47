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

//! A router over a fresh SQLite database plus request helpers.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use hopper::{Database, DAL};
use hopper_server::config::HopperConfig;
use hopper_server::AppState;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PRODUCER: &str = "producer-secret";
pub const WORKER: &str = "worker-secret";

pub struct TestServer {
    pub router: Router,
    pub dal: DAL,
    pub dir: TempDir,
}

pub fn test_config() -> HopperConfig {
    let mut config = HopperConfig::default();
    config.auth.producer_token = PRODUCER.to_string();
    config.auth.worker_token = WORKER.to_string();
    config
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: HopperConfig) -> Self {
        Self::build(config, |state| state).await
    }

    /// Builds the server, letting the caller adjust state before routing.
    pub async fn build(config: HopperConfig, customize: impl FnOnce(AppState) -> AppState) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("hopper.db");
        let db = Database::new(&format!("sqlite://{}", path.display()), 1)
            .expect("Failed to create SQLite pool");
        db.run_migrations().await.expect("Failed to run migrations");

        let dal = DAL::new(db);
        let router = customize(AppState::new(dal.clone(), &config)).into_router();
        TestServer { router, dal, dir }
    }

    /// Sends a request and returns the status with the body parsed as JSON
    /// (`Value::Null` for an empty body, a string for non-JSON text).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = request
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: &str) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Creates a job as the producer and returns its id.
    pub async fn create_job(&self, queue: &str) -> i64 {
        let (status, body) = self
            .post(
                "/jobs",
                Some(PRODUCER),
                &format!(r#"{{"queue":"{}","payload":{{"n":1}}}}"#, queue),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().expect("created job id")
    }
}
