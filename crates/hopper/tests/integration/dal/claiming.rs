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

//! Claim exclusivity, attempts bookkeeping and ordering.

use std::collections::HashSet;
use std::sync::Arc;

use hopper::{Database, JobError, JobStatus, NewJob, DAL};
use serde_json::json;
use tokio::sync::Barrier;

use crate::fixtures::TestFixture;

#[tokio::test]
async fn test_claim_then_second_claim_is_empty() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();

    let created = dal
        .jobs()
        .create(NewJob::new("render", json!({"x": 1})))
        .await
        .unwrap();
    assert_eq!(created.status, JobStatus::Pending);
    assert_eq!(created.attempts, 0);

    let claimed = dal
        .jobs()
        .claim("render", "w1")
        .await
        .unwrap()
        .expect("pending job should be claimable");
    assert_eq!(claimed.id, created.id);
    assert_eq!(claimed.status, JobStatus::Processing);
    assert_eq!(claimed.attempts, 1);
    assert_eq!(claimed.worker_id.as_deref(), Some("w1"));
    assert!(claimed.updated_at >= created.updated_at);
    assert_eq!(claimed.created_at, created.created_at);

    assert!(dal.jobs().claim("render", "w2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_claim_on_empty_or_other_queue_returns_none() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();

    assert!(dal.jobs().claim("render", "w1").await.unwrap().is_none());

    dal.jobs()
        .create(NewJob::new("encode", json!({})))
        .await
        .unwrap();
    assert!(dal.jobs().claim("render", "w1").await.unwrap().is_none());
    assert!(dal.jobs().claim("encode", "w1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_claim_requires_worker_and_queue() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();

    assert!(matches!(
        dal.jobs().claim("render", "").await,
        Err(JobError::Validation(_))
    ));
    assert!(matches!(
        dal.jobs().claim("", "w1").await,
        Err(JobError::Validation(_))
    ));
}

#[tokio::test]
async fn test_claim_is_fifo_without_contention() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();

    let mut created = Vec::new();
    for n in 0..5 {
        let job = dal
            .jobs()
            .create(NewJob::new("render", json!({ "n": n })))
            .await
            .unwrap();
        created.push(job.id);
    }

    let mut claimed = Vec::new();
    while let Some(job) = dal.jobs().claim("render", "w1").await.unwrap() {
        claimed.push(job.id);
    }
    assert_eq!(claimed, created);
}

#[tokio::test]
async fn test_attempts_increment_exactly_once_per_claim() {
    let fixture = TestFixture::new().await;
    let dal = fixture.get_dal();

    let job = dal
        .jobs()
        .create(NewJob::new("render", json!({})))
        .await
        .unwrap();
    let before = dal.jobs().get(job.id).await.unwrap().attempts;

    let claimed = dal.jobs().claim("render", "w1").await.unwrap().unwrap();
    assert_eq!(claimed.attempts, before + 1);

    // Terminal transitions never touch attempts.
    let completed = dal.jobs().complete(job.id, json!({})).await.unwrap();
    assert_eq!(completed.attempts, before + 1);
}

/// Many workers racing on one queue never receive the same job, and exactly
/// `min(jobs, workers)` jobs end up processing.
#[tokio::test]
async fn test_concurrent_claims_are_exclusive() {
    let fixture = TestFixture::new().await;
    let database = fixture.get_database();
    let dal = fixture.get_dal();

    const NUM_JOBS: usize = 12;
    const NUM_WORKERS: usize = 20;

    for n in 0..NUM_JOBS {
        dal.jobs()
            .create(NewJob::new("race", json!({ "n": n })))
            .await
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(NUM_WORKERS));
    let mut handles = Vec::new();
    for worker in 0..NUM_WORKERS {
        let database = database.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let dal = DAL::new(database);
            barrier.wait().await;
            dal.jobs()
                .claim("race", &format!("worker-{}", worker))
                .await
                .expect("claim should not error under contention")
                .map(|job| (job.id, job.worker_id))
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(claim) = handle.await.expect("worker task panicked") {
            claimed.push(claim);
        }
    }

    assert_eq!(claimed.len(), NUM_JOBS.min(NUM_WORKERS));
    let distinct: HashSet<_> = claimed.iter().map(|(id, _)| *id).collect();
    assert_eq!(distinct.len(), claimed.len(), "a job was claimed twice");

    let counts = dal.jobs().count_by_status(Some("race")).await.unwrap();
    assert_eq!(counts.processing as usize, NUM_JOBS.min(NUM_WORKERS));
    assert_eq!(counts.pending, 0);

    for (id, worker_id) in claimed {
        let stored = dal.jobs().get(id).await.unwrap();
        assert_eq!(stored.worker_id, worker_id);
        assert_eq!(stored.attempts, 1);
    }
}

#[tokio::test]
async fn test_concurrent_claims_with_fewer_jobs_than_workers() {
    let fixture = TestFixture::new().await;
    let database = fixture.get_database();
    let dal = fixture.get_dal();

    const NUM_JOBS: usize = 3;
    const NUM_WORKERS: usize = 8;

    for _ in 0..NUM_JOBS {
        dal.jobs()
            .create(NewJob::new("scarce", json!({})))
            .await
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(NUM_WORKERS));
    let handles: Vec<_> = (0..NUM_WORKERS)
        .map(|worker| {
            let database = database.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                DAL::new(database)
                    .jobs()
                    .claim("scarce", &format!("w{}", worker))
                    .await
                    .unwrap()
                    .map(|job| job.id)
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.await.unwrap());
    }

    let distinct: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(ids.len(), NUM_JOBS);
    assert_eq!(distinct.len(), NUM_JOBS);
}

/// Separate pools on one SQLite file behave like separate processes: the
/// only thing they share is the file lock. Every claim must still be exclusive
/// and no claimant may see a `database is locked` error.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_sqlite_handles_never_share_a_job() {
    const NUM_JOBS: usize = 40;
    const NUM_HANDLES: usize = 16;

    if std::env::var("TEST_DATABASE_BACKEND").as_deref() == Ok("postgres") {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("shared.db").display());

    let setup = Database::new(&url, 1).unwrap();
    setup.run_migrations().await.unwrap();
    let setup_dal = DAL::new(setup);
    for n in 0..NUM_JOBS {
        setup_dal
            .jobs()
            .create(NewJob::new("contended", json!({ "n": n })))
            .await
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(NUM_HANDLES));
    let handles: Vec<_> = (0..NUM_HANDLES)
        .map(|worker| {
            let url = url.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                let dal = DAL::new(Database::new(&url, 1).unwrap());
                let worker_id = format!("handle-{}", worker);
                let mut ids = Vec::new();
                let mut errors = Vec::new();
                barrier.wait().await;
                loop {
                    match dal.jobs().claim("contended", &worker_id).await {
                        Ok(Some(job)) => ids.push(job.id),
                        Ok(None) => break,
                        Err(e) => {
                            errors.push(e.to_string());
                            break;
                        }
                    }
                }
                (ids, errors)
            })
        })
        .collect();

    let mut claimed = Vec::new();
    for handle in handles {
        let (ids, errors) = handle.await.unwrap();
        assert!(errors.is_empty(), "claim failed under contention: {:?}", errors);
        claimed.extend(ids);
    }

    let distinct: HashSet<_> = claimed.iter().copied().collect();
    assert_eq!(distinct.len(), claimed.len(), "a job was claimed twice");

    // A claimant may give up after its retry rounds; whatever is left must
    // still be pending and claimable exactly once.
    while let Some(job) = setup_dal.jobs().claim("contended", "drain").await.unwrap() {
        assert!(!distinct.contains(&job.id), "drained a job already claimed");
        claimed.push(job.id);
    }
    assert_eq!(claimed.len(), NUM_JOBS);
    let distinct: HashSet<_> = claimed.iter().copied().collect();
    assert_eq!(distinct.len(), NUM_JOBS);

    let counts = setup_dal
        .jobs()
        .count_by_status(Some("contended"))
        .await
        .unwrap();
    assert_eq!(counts.processing as usize, NUM_JOBS);
    assert_eq!(counts.pending, 0);
}
