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

//! Job storage: creation, lookup, listing and status counts.
//!
//! Claiming lives in [`claiming`], terminal transitions in [`state`] and
//! progress reports in [`progress`]. All of them are methods on
//! [`JobDAL`].

mod claiming;
mod progress;
mod state;

use diesel::prelude::*;
use tracing::{info, warn};

use super::DAL;
use crate::error::JobError;
use crate::models::job::{Job, JobFilter, JobId, JobStatus, NewJob, StatusCounts};

/// Data access for the `jobs` table.
#[derive(Clone)]
pub struct JobDAL<'a> {
    dal: &'a DAL,
}

impl<'a> JobDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Inserts a new job in `pending` with zero progress and attempts.
    ///
    /// The input is validated before a connection is taken, so a rejected
    /// job never touches the database.
    pub async fn create(&self, new_job: NewJob) -> Result<Job, JobError> {
        new_job.validate()?;

        let job = crate::dispatch_backend!(
            self.dal.backend(),
            self.create_postgres(new_job).await,
            self.create_sqlite(new_job).await
        )?;

        metrics::counter!("hopper_jobs_created_total", "queue" => job.queue.clone()).increment(1);
        info!(job_id = job.id, queue = %job.queue, owner = ?job.owner, "Job created");
        Ok(job)
    }

    #[cfg(feature = "postgres")]
    async fn create_postgres(&self, new_job: NewJob) -> Result<Job, JobError> {
        use crate::dal::models::{NewPgJob, PgJob};
        use crate::database::schema::postgres::jobs;
        use crate::database::universal_types::UniversalTimestamp;

        let conn = self.dal.database.get_postgres_connection().await?;

        let now = UniversalTimestamp::now().to_naive();
        let row = NewPgJob {
            queue: new_job.queue,
            status: JobStatus::Pending.as_str().to_string(),
            payload: new_job.payload,
            owner: new_job.owner,
            max_retries: new_job.max_retries,
            created_at: now,
            updated_at: now,
        };

        let created: PgJob = conn
            .interact(move |conn| {
                diesel::insert_into(jobs::table)
                    .values(&row)
                    .returning(PgJob::as_returning())
                    .get_result(conn)
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        Job::try_from(created)
    }

    #[cfg(feature = "sqlite")]
    async fn create_sqlite(&self, new_job: NewJob) -> Result<Job, JobError> {
        use crate::dal::models::{NewSqliteJob, SqliteJob};
        use crate::database::schema::sqlite::jobs;
        use crate::database::universal_types::UniversalTimestamp;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let now = UniversalTimestamp::now().to_sqlite_text();
        let row = NewSqliteJob {
            queue: new_job.queue,
            status: JobStatus::Pending.as_str().to_string(),
            payload: new_job.payload.to_string(),
            owner: new_job.owner,
            max_retries: new_job.max_retries,
            created_at: now.clone(),
            updated_at: now,
        };

        let created: SqliteJob = conn
            .interact(move |conn| {
                diesel::insert_into(jobs::table)
                    .values(&row)
                    .returning(SqliteJob::as_returning())
                    .get_result(conn)
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        Job::try_from(created)
    }

    /// Point lookup by id.
    pub async fn get(&self, id: JobId) -> Result<Job, JobError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.get_postgres(id).await,
            self.get_sqlite(id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_postgres(&self, id: JobId) -> Result<Job, JobError> {
        use crate::dal::models::PgJob;
        use crate::database::schema::postgres::jobs;

        let conn = self.dal.database.get_postgres_connection().await?;
        let row: Option<PgJob> = conn
            .interact(move |conn| {
                jobs::table
                    .find(id)
                    .select(PgJob::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        row.ok_or(JobError::NotFound { id }).and_then(Job::try_from)
    }

    #[cfg(feature = "sqlite")]
    async fn get_sqlite(&self, id: JobId) -> Result<Job, JobError> {
        use crate::dal::models::SqliteJob;
        use crate::database::schema::sqlite::jobs;

        let conn = self.dal.database.get_sqlite_connection().await?;
        let row: Option<SqliteJob> = conn
            .interact(move |conn| {
                jobs::table
                    .find(id)
                    .select(SqliteJob::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        row.ok_or(JobError::NotFound { id }).and_then(Job::try_from)
    }

    /// Lists jobs matching `filter`, newest first, at most
    /// [`MAX_LIST_LIMIT`](crate::models::job::MAX_LIST_LIMIT) rows.
    pub async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, JobError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.list_postgres(filter).await,
            self.list_sqlite(filter).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn list_postgres(&self, filter: JobFilter) -> Result<Vec<Job>, JobError> {
        use crate::dal::models::PgJob;
        use crate::database::schema::postgres::jobs;

        let conn = self.dal.database.get_postgres_connection().await?;
        let limit = filter.effective_limit();

        let rows: Vec<PgJob> = conn
            .interact(move |conn| {
                let mut query = jobs::table.select(PgJob::as_select()).into_boxed();
                if let Some(queue) = filter.queue {
                    query = query.filter(jobs::queue.eq(queue));
                }
                if let Some(owner) = filter.owner {
                    query = query.filter(jobs::owner.eq(owner));
                }
                if let Some(status) = filter.status {
                    query = query.filter(jobs::status.eq(status.as_str()));
                }
                query
                    .order((jobs::created_at.desc(), jobs::id.desc()))
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Job::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn list_sqlite(&self, filter: JobFilter) -> Result<Vec<Job>, JobError> {
        use crate::dal::models::SqliteJob;
        use crate::database::schema::sqlite::jobs;

        let conn = self.dal.database.get_sqlite_connection().await?;
        let limit = filter.effective_limit();

        let rows: Vec<SqliteJob> = conn
            .interact(move |conn| {
                let mut query = jobs::table.select(SqliteJob::as_select()).into_boxed();
                if let Some(queue) = filter.queue {
                    query = query.filter(jobs::queue.eq(queue));
                }
                if let Some(owner) = filter.owner {
                    query = query.filter(jobs::owner.eq(owner));
                }
                if let Some(status) = filter.status {
                    query = query.filter(jobs::status.eq(status.as_str()));
                }
                query
                    .order((jobs::created_at.desc(), jobs::id.desc()))
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Job::try_from).collect()
    }

    /// Counts jobs per status, optionally within one queue.
    pub async fn count_by_status(&self, queue: Option<&str>) -> Result<StatusCounts, JobError> {
        let queue = queue.map(str::to_string);
        let rows = crate::dispatch_backend!(
            self.dal.backend(),
            self.count_by_status_postgres(queue).await,
            self.count_by_status_sqlite(queue).await
        )?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match status.parse::<JobStatus>() {
                Ok(status) => counts.add(status, count),
                Err(reason) => warn!(count, "Skipping rows with unreadable status: {}", reason),
            }
        }
        Ok(counts)
    }

    #[cfg(feature = "postgres")]
    async fn count_by_status_postgres(
        &self,
        queue: Option<String>,
    ) -> Result<Vec<(String, i64)>, JobError> {
        use crate::database::schema::postgres::jobs;

        let conn = self.dal.database.get_postgres_connection().await?;
        let rows = conn
            .interact(move |conn| {
                match queue {
                    Some(queue) => jobs::table
                        .filter(jobs::queue.eq(queue))
                        .group_by(jobs::status)
                        .select((jobs::status, diesel::dsl::count_star()))
                        .load::<(String, i64)>(conn),
                    None => jobs::table
                        .group_by(jobs::status)
                        .select((jobs::status, diesel::dsl::count_star()))
                        .load::<(String, i64)>(conn),
                }
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;
        Ok(rows)
    }

    #[cfg(feature = "sqlite")]
    async fn count_by_status_sqlite(
        &self,
        queue: Option<String>,
    ) -> Result<Vec<(String, i64)>, JobError> {
        use crate::database::schema::sqlite::jobs;

        let conn = self.dal.database.get_sqlite_connection().await?;
        let rows = conn
            .interact(move |conn| {
                match queue {
                    Some(queue) => jobs::table
                        .filter(jobs::queue.eq(queue))
                        .group_by(jobs::status)
                        .select((jobs::status, diesel::dsl::count_star()))
                        .load::<(String, i64)>(conn),
                    None => jobs::table
                        .group_by(jobs::status)
                        .select((jobs::status, diesel::dsl::count_star()))
                        .load::<(String, i64)>(conn),
                }
            })
            .await
            .map_err(|e| JobError::ConnectionPool(e.to_string()))??;
        Ok(rows)
    }
}
