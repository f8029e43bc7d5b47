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

//! Progress reports from the worker holding a job.
//!
//! Progress is clamped into 0..=100. A message is appended to `result.logs`
//! as `{timestamp, message}`; earlier entries are never rewritten. The row
//! is locked for the read-modify-write so concurrent reports cannot drop an
//! entry. Status never changes here.

use diesel::prelude::*;
use tracing::debug;

use super::JobDAL;
use crate::error::JobError;
use crate::models::job::{append_log_entry, Job, JobId, JobStatus, LogEntry, ProgressUpdate};

const OPERATION: &str = "report progress on";

impl<'a> JobDAL<'a> {
    /// Applies a progress report to a job in `processing`.
    pub async fn report_progress(
        &self,
        id: JobId,
        update: ProgressUpdate,
    ) -> Result<Job, JobError> {
        update.validate()?;

        let progress = update.clamped_progress();
        if let (Some(requested), Some(stored)) = (update.progress, progress) {
            if requested != i64::from(stored) {
                debug!(job_id = id, requested, stored, "Clamped out-of-range progress");
            }
        }
        let entry = update.log_message().map(LogEntry::new);

        let job = crate::dispatch_backend!(
            self.dal.backend(),
            self.report_progress_postgres(id, progress, entry).await,
            self.report_progress_sqlite(id, progress, entry).await
        )?;

        debug!(
            job_id = job.id,
            progress = job.progress,
            worker_id = ?job.worker_id,
            "Progress reported"
        );
        Ok(job)
    }

    #[cfg(feature = "postgres")]
    async fn report_progress_postgres(
        &self,
        id: JobId,
        progress: Option<i32>,
        entry: Option<LogEntry>,
    ) -> Result<Job, JobError> {
        use crate::dal::models::{parse_status, PgJob, PgProgressChanges};
        use crate::database::schema::postgres::jobs;
        use crate::database::universal_types::UniversalTimestamp;
        use diesel::connection::Connection;
        use serde_json::Value;

        let conn = self.dal.database.get_postgres_connection().await?;

        let row: PgJob = conn
            .interact(move |conn| {
                conn.transaction::<_, JobError, _>(|conn| {
                    let (status, result): (String, Option<Value>) = jobs::table
                        .find(id)
                        .select((jobs::status, jobs::result))
                        .for_update()
                        .first(conn)
                        .optional()?
                        .ok_or(JobError::NotFound { id })?;
                    parse_status(id, &status)?.ensure_is(id, OPERATION, JobStatus::Processing)?;

                    let changes = PgProgressChanges {
                        progress,
                        result: entry.as_ref().map(|entry| append_log_entry(result, entry)),
                        updated_at: UniversalTimestamp::now().to_naive(),
                    };

                    let row = diesel::update(jobs::table.find(id))
                        .set(&changes)
                        .returning(PgJob::as_returning())
                        .get_result(conn)?;
                    Ok(row)
                })
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        Job::try_from(row)
    }

    #[cfg(feature = "sqlite")]
    async fn report_progress_sqlite(
        &self,
        id: JobId,
        progress: Option<i32>,
        entry: Option<LogEntry>,
    ) -> Result<Job, JobError> {
        use crate::dal::models::{parse_status, SqliteJob, SqliteProgressChanges};
        use crate::database::schema::sqlite::jobs;
        use crate::database::universal_types::UniversalTimestamp;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let row: SqliteJob = conn
            .interact(move |conn| {
                conn.immediate_transaction::<_, JobError, _>(|conn| {
                    let (status, result): (String, Option<String>) = jobs::table
                        .find(id)
                        .select((jobs::status, jobs::result))
                        .first(conn)
                        .optional()?
                        .ok_or(JobError::NotFound { id })?;
                    parse_status(id, &status)?.ensure_is(id, OPERATION, JobStatus::Processing)?;

                    let result = match (entry.as_ref(), result) {
                        (Some(entry), existing) => {
                            let existing = existing
                                .as_deref()
                                .map(serde_json::from_str::<serde_json::Value>)
                                .transpose()
                                .map_err(|e| JobError::CorruptRecord {
                                    id,
                                    reason: format!("result is not valid JSON: {}", e),
                                })?;
                            Some(append_log_entry(existing, entry).to_string())
                        }
                        (None, _) => None,
                    };

                    let changes = SqliteProgressChanges {
                        progress,
                        result,
                        updated_at: UniversalTimestamp::now().to_sqlite_text(),
                    };

                    let row = diesel::update(jobs::table.find(id))
                        .set(&changes)
                        .returning(SqliteJob::as_returning())
                        .get_result(conn)?;
                    Ok(row)
                })
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        Job::try_from(row)
    }
}
