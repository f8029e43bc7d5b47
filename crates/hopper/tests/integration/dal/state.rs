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

//! Terminal transitions and their source-state checks.

use hopper::{JobError, JobStatus, NewJob, ProgressUpdate, DAL};
use serde_json::json;

use crate::fixtures::TestFixture;

async fn claimed_job(dal: &DAL) -> hopper::Job {
    dal.jobs()
        .create(NewJob::new("render", json!({"x": 1})))
        .await
        .unwrap();
    dal.jobs()
        .claim("render", "w1")
        .await
        .unwrap()
        .expect("job should be claimable")
}

#[tokio::test]
async fn test_complete_replaces_result_and_pins_progress() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();
    let job = claimed_job(&dal).await;

    dal.jobs()
        .report_progress(job.id, ProgressUpdate::progress(40).with_message("halfway"))
        .await
        .unwrap();

    let completed = dal
        .jobs()
        .complete(job.id, json!({"out": "file.mp4"}))
        .await
        .unwrap();

    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(completed.progress, 100);
    assert_eq!(completed.result, Some(json!({"out": "file.mp4"})));
    assert!(completed.logs().is_empty());
    assert_eq!(completed.worker_id.as_deref(), Some("w1"));

    let err = dal.jobs().fail(job.id, json!("x")).await.unwrap_err();
    assert!(matches!(
        err,
        JobError::InvalidTransition {
            actual: JobStatus::Completed,
            expected: JobStatus::Processing,
            ..
        }
    ));
    assert_eq!(dal.jobs().get(job.id).await.unwrap(), completed);
}

#[tokio::test]
async fn test_fail_stores_error_and_keeps_progress() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();
    let job = claimed_job(&dal).await;

    dal.jobs()
        .report_progress(job.id, ProgressUpdate::progress(25))
        .await
        .unwrap();

    let failed = dal
        .jobs()
        .fail(job.id, json!("codec not found"))
        .await
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.progress, 25);
    assert_eq!(failed.result, Some(json!({"error": "codec not found"})));
    assert_eq!(failed.attempts, 1);

    // Failure never re-queues.
    assert!(dal.jobs().claim("render", "w2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_fail_keeps_structured_detail() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();
    let job = claimed_job(&dal).await;

    let detail = json!({"code": 137, "stage": "encode", "retryable": false});
    let failed = dal.jobs().fail(job.id, detail.clone()).await.unwrap();
    assert_eq!(failed.result, Some(json!({ "error": detail })));

    let stored = dal.jobs().get(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.result.unwrap()["error"]["code"], 137);
}

#[tokio::test]
async fn test_terminal_ops_require_processing() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();

    let pending = dal
        .jobs()
        .create(NewJob::new("render", json!({})))
        .await
        .unwrap();

    for result in [
        dal.jobs().complete(pending.id, json!({})).await,
        dal.jobs().fail(pending.id, json!("nope")).await,
    ] {
        assert!(matches!(
            result,
            Err(JobError::InvalidTransition {
                actual: JobStatus::Pending,
                ..
            })
        ));
    }
    assert_eq!(dal.jobs().get(pending.id).await.unwrap(), pending);

    let job = dal.jobs().claim("render", "w1").await.unwrap().unwrap();
    let failed = dal.jobs().fail(job.id, json!("first")).await.unwrap();

    for result in [
        dal.jobs().complete(job.id, json!({})).await,
        dal.jobs().fail(job.id, json!("second")).await,
    ] {
        assert!(matches!(
            result,
            Err(JobError::InvalidTransition {
                actual: JobStatus::Failed,
                ..
            })
        ));
    }
    assert_eq!(dal.jobs().get(job.id).await.unwrap(), failed);
}

#[tokio::test]
async fn test_terminal_ops_on_missing_job() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();

    assert!(matches!(
        dal.jobs().complete(4242, json!({})).await,
        Err(JobError::NotFound { id: 4242 })
    ));
    assert!(matches!(
        dal.jobs().fail(4242, json!("x")).await,
        Err(JobError::NotFound { id: 4242 })
    ));
}

#[tokio::test]
async fn test_concurrent_completion_succeeds_once() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();
    let job = claimed_job(&dal).await;

    let database = fixture.get_database();
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let database = database.clone();
            tokio::spawn(async move {
                let dal = DAL::new(database);
                if n % 2 == 0 {
                    dal.jobs().complete(job.id, json!({ "n": n })).await
                } else {
                    dal.jobs().fail(job.id, json!("racing")).await
                }
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(JobError::InvalidTransition { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(successes, 1);
    assert!(dal.jobs().get(job.id).await.unwrap().status.is_terminal());
}
