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

//! Progress clamping and the append-only log.

use hopper::{JobError, JobStatus, NewJob, ProgressUpdate, DAL};
use serde_json::json;

use crate::fixtures::TestFixture;

async fn claimed_job(dal: &DAL) -> hopper::Job {
    dal.jobs()
        .create(NewJob::new("render", json!({"x": 1})))
        .await
        .unwrap();
    dal.jobs().claim("render", "w1").await.unwrap().unwrap()
}

#[tokio::test]
async fn test_progress_is_clamped_and_logged() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();
    let job = claimed_job(&dal).await;

    let over = dal
        .jobs()
        .report_progress(job.id, ProgressUpdate::progress(150))
        .await
        .unwrap();
    assert_eq!(over.progress, 100);

    let under = dal
        .jobs()
        .report_progress(job.id, ProgressUpdate::progress(-20))
        .await
        .unwrap();
    assert_eq!(under.progress, 0);

    let halfway = dal
        .jobs()
        .report_progress(job.id, ProgressUpdate::progress(40).with_message("halfway"))
        .await
        .unwrap();
    assert_eq!(halfway.progress, 40);
    assert_eq!(halfway.status, JobStatus::Processing);

    let logs = halfway.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "halfway");
}

#[tokio::test]
async fn test_log_is_append_only() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();
    let job = claimed_job(&dal).await;

    for message in ["decoding", "filtering", "encoding"] {
        dal.jobs()
            .report_progress(job.id, ProgressUpdate::message(message))
            .await
            .unwrap();
    }

    let stored = dal.jobs().get(job.id).await.unwrap();
    let messages: Vec<_> = stored.logs().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["decoding", "filtering", "encoding"]);

    let timestamps: Vec<_> = stored.logs().into_iter().map(|e| e.timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));

    // A message-only report leaves progress alone.
    assert_eq!(stored.progress, 0);
}

#[tokio::test]
async fn test_concurrent_reports_keep_every_entry() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();
    let job = claimed_job(&dal).await;
    let database = fixture.get_database();

    const REPORTS: usize = 10;
    let handles: Vec<_> = (0..REPORTS)
        .map(|n| {
            let database = database.clone();
            tokio::spawn(async move {
                DAL::new(database)
                    .jobs()
                    .report_progress(job.id, ProgressUpdate::message(format!("step {}", n)))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = dal.jobs().get(job.id).await.unwrap();
    assert_eq!(stored.logs().len(), REPORTS);
}

#[tokio::test]
async fn test_progress_requires_processing() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();

    let pending = dal
        .jobs()
        .create(NewJob::new("render", json!({})))
        .await
        .unwrap();
    assert!(matches!(
        dal.jobs()
            .report_progress(pending.id, ProgressUpdate::progress(10))
            .await,
        Err(JobError::InvalidTransition {
            actual: JobStatus::Pending,
            expected: JobStatus::Processing,
            ..
        })
    ));

    let job = dal.jobs().claim("render", "w1").await.unwrap().unwrap();
    dal.jobs().complete(job.id, json!({})).await.unwrap();
    assert!(matches!(
        dal.jobs()
            .report_progress(job.id, ProgressUpdate::message("late"))
            .await,
        Err(JobError::InvalidTransition {
            actual: JobStatus::Completed,
            ..
        })
    ));

    assert!(matches!(
        dal.jobs()
            .report_progress(9999, ProgressUpdate::progress(1))
            .await,
        Err(JobError::NotFound { id: 9999 })
    ));
}

#[tokio::test]
async fn test_empty_update_is_rejected() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();
    let job = claimed_job(&dal).await;

    assert!(matches!(
        dal.jobs()
            .report_progress(job.id, ProgressUpdate::default())
            .await,
        Err(JobError::Validation(_))
    ));
    assert!(matches!(
        dal.jobs()
            .report_progress(job.id, ProgressUpdate::message("   "))
            .await,
        Err(JobError::Validation(_))
    ));
}
