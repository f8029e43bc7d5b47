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

//! Terminal transitions: `processing -> completed` and `processing -> failed`.
//!
//! The current status is read with the row locked (`FOR UPDATE` on
//! PostgreSQL, an immediate transaction on SQLite) and the write is still
//! guarded by `status = 'processing'`, so a job can only leave
//! `processing` once.

use diesel::prelude::*;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::JobDAL;
use crate::error::JobError;
use crate::models::job::{Job, JobId, JobStatus};

/// A terminal write: which status to enter and what to store.
#[derive(Debug, Clone)]
struct Terminal {
    operation: &'static str,
    status: JobStatus,
    result: Value,
    /// Completion pins progress to 100; failure leaves it alone.
    progress: Option<i32>,
}

impl<'a> JobDAL<'a> {
    /// Marks a processing job completed.
    ///
    /// Progress becomes 100 and `result` is replaced wholesale, dropping any
    /// progress log entries.
    pub async fn complete(&self, id: JobId, result: Value) -> Result<Job, JobError> {
        let job = self
            .finish(
                id,
                Terminal {
                    operation: "complete",
                    status: JobStatus::Completed,
                    result,
                    progress: Some(100),
                },
            )
            .await?;

        metrics::counter!("hopper_jobs_completed_total", "queue" => job.queue.clone())
            .increment(1);
        info!(job_id = job.id, queue = %job.queue, worker_id = ?job.worker_id, "Job completed");
        Ok(job)
    }

    /// Marks a processing job failed, storing `{"error": detail}` as its result.
    ///
    /// `detail` may be any JSON value, so workers can report structured
    /// errors. Progress is left where the worker last reported it. The job
    /// is not re-queued; `attempts` and `max_retries` are left for a policy
    /// layer.
    pub async fn fail(&self, id: JobId, detail: Value) -> Result<Job, JobError> {
        let summary = match &detail {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let job = self
            .finish(
                id,
                Terminal {
                    operation: "fail",
                    status: JobStatus::Failed,
                    result: json!({ "error": detail }),
                    progress: None,
                },
            )
            .await?;

        metrics::counter!("hopper_jobs_failed_total", "queue" => job.queue.clone()).increment(1);
        warn!(
            job_id = job.id,
            queue = %job.queue,
            worker_id = ?job.worker_id,
            attempts = job.attempts,
            "Job failed: {}",
            summary
        );
        Ok(job)
    }

    async fn finish(&self, id: JobId, terminal: Terminal) -> Result<Job, JobError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.finish_postgres(id, terminal).await,
            self.finish_sqlite(id, terminal).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn finish_postgres(&self, id: JobId, terminal: Terminal) -> Result<Job, JobError> {
        use crate::dal::models::{parse_status, PgJob};
        use crate::database::schema::postgres::jobs;
        use crate::database::universal_types::UniversalTimestamp;
        use diesel::connection::Connection;

        let conn = self.dal.database.get_postgres_connection().await?;

        let row: PgJob = conn
            .interact(move |conn| {
                conn.transaction::<_, JobError, _>(|conn| {
                    let current: String = jobs::table
                        .find(id)
                        .select(jobs::status)
                        .for_update()
                        .first(conn)
                        .optional()?
                        .ok_or(JobError::NotFound { id })?;
                    parse_status(id, &current)?.ensure_transition(
                        id,
                        terminal.operation,
                        terminal.status,
                    )?;

                    let now = UniversalTimestamp::now().to_naive();
                    let guarded = jobs::table
                        .find(id)
                        .filter(jobs::status.eq(JobStatus::Processing.as_str()));

                    let row = match terminal.progress {
                        Some(progress) => diesel::update(guarded)
                            .set((
                                jobs::status.eq(terminal.status.as_str()),
                                jobs::result.eq(Some(terminal.result.clone())),
                                jobs::progress.eq(progress),
                                jobs::updated_at.eq(now),
                            ))
                            .returning(PgJob::as_returning())
                            .get_result(conn)?,
                        None => diesel::update(guarded)
                            .set((
                                jobs::status.eq(terminal.status.as_str()),
                                jobs::result.eq(Some(terminal.result.clone())),
                                jobs::updated_at.eq(now),
                            ))
                            .returning(PgJob::as_returning())
                            .get_result(conn)?,
                    };
                    Ok(row)
                })
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        Job::try_from(row)
    }

    #[cfg(feature = "sqlite")]
    async fn finish_sqlite(&self, id: JobId, terminal: Terminal) -> Result<Job, JobError> {
        use crate::dal::models::{parse_status, SqliteJob};
        use crate::database::schema::sqlite::jobs;
        use crate::database::universal_types::UniversalTimestamp;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let row: SqliteJob = conn
            .interact(move |conn| {
                conn.immediate_transaction::<_, JobError, _>(|conn| {
                    let current: String = jobs::table
                        .find(id)
                        .select(jobs::status)
                        .first(conn)
                        .optional()?
                        .ok_or(JobError::NotFound { id })?;
                    parse_status(id, &current)?.ensure_transition(
                        id,
                        terminal.operation,
                        terminal.status,
                    )?;

                    let now = UniversalTimestamp::now().to_sqlite_text();
                    let result = terminal.result.to_string();
                    let guarded = jobs::table
                        .find(id)
                        .filter(jobs::status.eq(JobStatus::Processing.as_str()));

                    let row = match terminal.progress {
                        Some(progress) => diesel::update(guarded)
                            .set((
                                jobs::status.eq(terminal.status.as_str()),
                                jobs::result.eq(Some(result)),
                                jobs::progress.eq(progress),
                                jobs::updated_at.eq(now),
                            ))
                            .returning(SqliteJob::as_returning())
                            .get_result(conn)?,
                        None => diesel::update(guarded)
                            .set((
                                jobs::status.eq(terminal.status.as_str()),
                                jobs::result.eq(Some(result)),
                                jobs::updated_at.eq(now),
                            ))
                            .returning(SqliteJob::as_returning())
                            .get_result(conn)?,
                    };
                    Ok(row)
                })
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        Job::try_from(row)
    }
}
