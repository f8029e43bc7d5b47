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

//! Claiming pending jobs.
//!
//! A claim moves the oldest pending job of a queue to `processing` and binds
//! it to one worker. No two concurrent claims may ever return the same job.
//!
//! - PostgreSQL selects the candidate with `FOR UPDATE SKIP LOCKED` and
//!   updates it in the same statement, so claimants fan out across rows
//!   instead of waiting on each other.
//! - SQLite has no lock skipping. Each candidate is taken with a conditional
//!   `UPDATE ... WHERE id = ? AND status = 'pending'`; zero affected rows is
//!   a conflict and the next candidate is tried.

use diesel::prelude::*;
use tracing::{debug, info};

use super::JobDAL;
use crate::database::ClaimStrategy;
use crate::error::JobError;
use crate::models::job::{validate_queue, validate_worker_id, Job, JobStatus};

/// Candidates fetched per compare-and-set round.
#[cfg(feature = "sqlite")]
const CLAIM_CANDIDATE_BATCH: i64 = 16;

/// Rounds of candidate batches before giving up and reporting no job.
#[cfg(feature = "sqlite")]
const MAX_CLAIM_ROUNDS: usize = 8;

#[cfg(feature = "postgres")]
const SKIP_LOCKED_CLAIM_SQL: &str = r#"
    UPDATE jobs
    SET status = 'processing',
        worker_id = $1,
        attempts = attempts + 1,
        updated_at = $2
    WHERE status = 'pending'
      AND id = (
        SELECT id FROM jobs
        WHERE queue = $3 AND status = 'pending'
        ORDER BY created_at ASC, id ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
      )
    RETURNING *
"#;

impl<'a> JobDAL<'a> {
    /// Claims the oldest pending job in `queue` for `worker_id`.
    ///
    /// Returns `Ok(None)` when the queue has nothing claimable. On success the
    /// job is `processing`, `worker_id` is set and `attempts` has grown by one.
    /// FIFO order is best-effort: a row locked by a concurrent claim is
    /// skipped, so a newer job may be returned under contention.
    pub async fn claim(&self, queue: &str, worker_id: &str) -> Result<Option<Job>, JobError> {
        validate_queue(queue)?;
        validate_worker_id(worker_id)?;

        let queue = queue.to_string();
        let worker_id = worker_id.to_string();

        let claimed = match self.dal.backend().claim_strategy() {
            #[cfg(feature = "postgres")]
            ClaimStrategy::SkipLocked => self.claim_skip_locked(queue, worker_id).await?,
            #[cfg(feature = "sqlite")]
            ClaimStrategy::CompareAndSet => self.claim_compare_and_set(queue, worker_id).await?,
            #[allow(unreachable_patterns)]
            strategy => {
                return Err(JobError::ConnectionPool(format!(
                    "claim strategy {:?} is not available in this build",
                    strategy
                )))
            }
        };

        if let Some(job) = &claimed {
            metrics::counter!("hopper_jobs_claimed_total", "queue" => job.queue.clone())
                .increment(1);
            info!(
                job_id = job.id,
                queue = %job.queue,
                worker_id = job.worker_id.as_deref().unwrap_or_default(),
                attempts = job.attempts,
                "Job claimed"
            );
        }
        Ok(claimed)
    }

    #[cfg(feature = "postgres")]
    async fn claim_skip_locked(
        &self,
        queue: String,
        worker_id: String,
    ) -> Result<Option<Job>, JobError> {
        use crate::dal::models::PgJob;
        use crate::database::universal_types::UniversalTimestamp;
        use diesel::connection::Connection;
        use diesel::sql_types::{Text, Timestamp};

        let conn = self.dal.database.get_postgres_connection().await?;

        let row: Option<PgJob> = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let now = UniversalTimestamp::now().to_naive();
                    diesel::sql_query(SKIP_LOCKED_CLAIM_SQL)
                        .bind::<Text, _>(&worker_id)
                        .bind::<Timestamp, _>(now)
                        .bind::<Text, _>(&queue)
                        .get_result::<PgJob>(conn)
                        .optional()
                })
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        row.map(Job::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn claim_compare_and_set(
        &self,
        queue: String,
        worker_id: String,
    ) -> Result<Option<Job>, JobError> {
        use crate::dal::models::SqliteJob;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let row: Option<SqliteJob> = conn
            .interact(move |conn| -> Result<Option<SqliteJob>, JobError> {
                for round in 0..MAX_CLAIM_ROUNDS {
                    let candidates = pending_candidates(conn, &queue)?;
                    if candidates.is_empty() {
                        return Ok(None);
                    }
                    if let Some(row) = claim_first_available(conn, &candidates, &worker_id)? {
                        return Ok(Some(row));
                    }
                    debug!(round, queue = %queue, "Every candidate was taken; refetching");
                }
                Ok(None)
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        row.map(Job::try_from).transpose()
    }
}

/// Oldest pending ids in `queue`, at most one batch.
#[cfg(feature = "sqlite")]
fn pending_candidates(
    conn: &mut diesel::sqlite::SqliteConnection,
    queue: &str,
) -> Result<Vec<i64>, JobError> {
    use crate::database::schema::sqlite::jobs;

    Ok(jobs::table
        .filter(jobs::queue.eq(queue))
        .filter(jobs::status.eq(JobStatus::Pending.as_str()))
        .order((jobs::created_at.asc(), jobs::id.asc()))
        .select(jobs::id)
        .limit(CLAIM_CANDIDATE_BATCH)
        .load(conn)?)
}

/// Takes the first of `candidates` that is still pending.
///
/// The list may be stale by the time it is walked. A candidate another
/// worker took in the meantime is a conflict: it is counted and skipped.
#[cfg(feature = "sqlite")]
fn claim_first_available(
    conn: &mut diesel::sqlite::SqliteConnection,
    candidates: &[i64],
    worker_id: &str,
) -> Result<Option<crate::dal::models::SqliteJob>, JobError> {
    for &candidate in candidates {
        match try_claim_candidate(conn, candidate, worker_id) {
            Ok(row) => return Ok(Some(row)),
            Err(JobError::ConcurrencyConflict { id }) => {
                metrics::counter!("hopper_claim_conflicts_total").increment(1);
                debug!(job_id = id, "Claim candidate taken concurrently");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Takes one candidate if it is still pending.
///
/// The write lock is taken up front so a busy database is waited on
/// through `busy_timeout` rather than failing mid-transaction.
#[cfg(feature = "sqlite")]
fn try_claim_candidate(
    conn: &mut diesel::sqlite::SqliteConnection,
    candidate: i64,
    worker_id: &str,
) -> Result<crate::dal::models::SqliteJob, JobError> {
    use crate::dal::models::SqliteJob;
    use crate::database::schema::sqlite::jobs;
    use crate::database::universal_types::UniversalTimestamp;

    conn.immediate_transaction::<_, JobError, _>(|conn| {
        let now = UniversalTimestamp::now().to_sqlite_text();
        diesel::update(
            jobs::table
                .filter(jobs::id.eq(candidate))
                .filter(jobs::status.eq(JobStatus::Pending.as_str())),
        )
        .set((
            jobs::status.eq(JobStatus::Processing.as_str()),
            jobs::worker_id.eq(worker_id),
            jobs::attempts.eq(jobs::attempts + 1),
            jobs::updated_at.eq(now),
        ))
        .returning(SqliteJob::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or(JobError::ConcurrencyConflict { id: candidate })
    })
}
