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

use axum::http::StatusCode;

use crate::support::{TestServer, PRODUCER};

#[tokio::test]
async fn test_create_and_read_job() {
    let server = TestServer::new().await;

    let (status, body) = server
        .post(
            "/jobs",
            Some(PRODUCER),
            r#"{"queue":"render","owner":"acme","payload":{"frames":24},"max_retries":5}"#,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ok"], true);
    let id = body["id"].as_i64().unwrap();

    let (status, job) = server.get(&format!("/jobs/{}", id), Some(PRODUCER)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["id"], id);
    assert_eq!(job["queue"], "render");
    assert_eq!(job["owner"], "acme");
    assert_eq!(job["status"], "pending");
    assert_eq!(job["progress"], 0);
    assert_eq!(job["max_retries"], 5);
    assert_eq!(job["payload"]["frames"], 24);
}

#[tokio::test]
async fn test_create_uses_configured_defaults() {
    let server = TestServer::new().await;

    let (status, body) = server
        .post("/jobs", Some(PRODUCER), r#"{"payload":[1,2,3]}"#)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, job) = server
        .get(&format!("/jobs/{}", body["id"]), Some(PRODUCER))
        .await;
    assert_eq!(job["queue"], hopper::models::job::DEFAULT_QUEUE);
    assert_eq!(job["max_retries"], hopper::models::job::DEFAULT_MAX_RETRIES);
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let server = TestServer::new().await;

    let (status, body) = server.post("/jobs", Some(PRODUCER), r#"{"queue":"render"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = server.post("/jobs", Some(PRODUCER), "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .post("/jobs", Some(PRODUCER), r#"{"queue":"  ","payload":{}}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_missing_job_is_404() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/jobs/4242", Some(PRODUCER)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_list_filters_and_orders_newest_first() {
    let server = TestServer::new().await;

    let first = server.create_job("render").await;
    let second = server.create_job("render").await;
    let other = server.create_job("encode").await;

    let (status, body) = server.get("/jobs?queue=render", Some(PRODUCER)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second, first]);

    let (_, body) = server.get("/jobs?limit=1", Some(PRODUCER)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], other);

    let (status, _) = server.get("/jobs?status=cancelled", Some(PRODUCER)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = server.get("/jobs?status=pending", Some(PRODUCER)).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let mut config = crate::support::test_config();
    config.server.request_body_limit_bytes = 64;
    let server = TestServer::with_config(config).await;

    let big = format!(r#"{{"payload":"{}"}}"#, "x".repeat(256));
    let (status, _) = server.post("/jobs", Some(PRODUCER), &big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (_, body) = server.get("/jobs", Some(PRODUCER)).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}
