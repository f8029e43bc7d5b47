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

//! Backend-specific row models.
//!
//! Each backend stores the job table with its native column types. These
//! structs mirror those columns exactly and are converted into the domain
//! [`Job`] at the DAL boundary; a row that cannot be converted is reported
//! as a corrupt record rather than silently patched.

use crate::error::JobError;
use crate::models::job::{Job, JobId, JobStatus};

/// Parses a stored status column.
pub(crate) fn parse_status(id: JobId, status: &str) -> Result<JobStatus, JobError> {
    status.parse().map_err(|reason| JobError::CorruptRecord { id, reason })
}

// ============================================================================
// PostgreSQL Models
// ============================================================================

#[cfg(feature = "postgres")]
mod postgres {
    use super::*;
    use crate::database::schema::postgres::jobs;
    use crate::database::universal_types::UniversalTimestamp;
    use chrono::NaiveDateTime;
    use diesel::prelude::*;
    use serde_json::Value;

    #[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
    #[diesel(table_name = jobs)]
    #[diesel(check_for_backend(diesel::pg::Pg))]
    pub struct PgJob {
        pub id: i64,
        pub queue: String,
        pub status: String,
        pub payload: Value,
        pub result: Option<Value>,
        pub progress: i32,
        pub worker_id: Option<String>,
        pub owner: Option<String>,
        pub attempts: i32,
        pub max_retries: i32,
        pub created_at: NaiveDateTime,
        pub updated_at: NaiveDateTime,
    }

    #[derive(Debug, Insertable)]
    #[diesel(table_name = jobs)]
    pub struct NewPgJob {
        pub queue: String,
        pub status: String,
        pub payload: Value,
        pub owner: Option<String>,
        pub max_retries: i32,
        pub created_at: NaiveDateTime,
        pub updated_at: NaiveDateTime,
    }

    /// Fields touched by a progress report. `None` leaves the column as is.
    #[derive(Debug, AsChangeset)]
    #[diesel(table_name = jobs)]
    pub struct PgProgressChanges {
        pub progress: Option<i32>,
        pub result: Option<Value>,
        pub updated_at: NaiveDateTime,
    }

    impl TryFrom<PgJob> for Job {
        type Error = JobError;

        fn try_from(row: PgJob) -> Result<Self, Self::Error> {
            Ok(Job {
                id: row.id,
                status: parse_status(row.id, &row.status)?,
                queue: row.queue,
                owner: row.owner,
                payload: row.payload,
                progress: row.progress,
                result: row.result,
                attempts: row.attempts,
                max_retries: row.max_retries,
                worker_id: row.worker_id,
                created_at: UniversalTimestamp::from_naive(row.created_at),
                updated_at: UniversalTimestamp::from_naive(row.updated_at),
            })
        }
    }
}

#[cfg(feature = "postgres")]
pub(crate) use postgres::{NewPgJob, PgJob, PgProgressChanges};

// ============================================================================
// SQLite Models
// ============================================================================

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use crate::database::schema::sqlite::jobs;
    use crate::database::universal_types::UniversalTimestamp;
    use diesel::prelude::*;
    use serde_json::Value;

    #[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
    #[diesel(table_name = jobs)]
    #[diesel(check_for_backend(diesel::sqlite::Sqlite))]
    pub struct SqliteJob {
        pub id: i64,
        pub queue: String,
        pub status: String,
        pub payload: String,
        pub result: Option<String>,
        pub progress: i32,
        pub worker_id: Option<String>,
        pub owner: Option<String>,
        pub attempts: i32,
        pub max_retries: i32,
        pub created_at: String,
        pub updated_at: String,
    }

    #[derive(Debug, Insertable)]
    #[diesel(table_name = jobs)]
    pub struct NewSqliteJob {
        pub queue: String,
        pub status: String,
        pub payload: String,
        pub owner: Option<String>,
        pub max_retries: i32,
        pub created_at: String,
        pub updated_at: String,
    }

    #[derive(Debug, AsChangeset)]
    #[diesel(table_name = jobs)]
    pub struct SqliteProgressChanges {
        pub progress: Option<i32>,
        pub result: Option<String>,
        pub updated_at: String,
    }

    fn parse_json(id: JobId, column: &str, text: &str) -> Result<Value, JobError> {
        serde_json::from_str(text).map_err(|e| JobError::CorruptRecord {
            id,
            reason: format!("{} is not valid JSON: {}", column, e),
        })
    }

    fn parse_timestamp(id: JobId, column: &str, text: &str) -> Result<UniversalTimestamp, JobError> {
        UniversalTimestamp::from_rfc3339(text).map_err(|e| JobError::CorruptRecord {
            id,
            reason: format!("{} is not an RFC 3339 timestamp: {}", column, e),
        })
    }

    impl TryFrom<SqliteJob> for Job {
        type Error = JobError;

        fn try_from(row: SqliteJob) -> Result<Self, Self::Error> {
            let id = row.id;
            Ok(Job {
                id,
                status: parse_status(id, &row.status)?,
                payload: parse_json(id, "payload", &row.payload)?,
                result: row
                    .result
                    .as_deref()
                    .map(|text| parse_json(id, "result", text))
                    .transpose()?,
                created_at: parse_timestamp(id, "created_at", &row.created_at)?,
                updated_at: parse_timestamp(id, "updated_at", &row.updated_at)?,
                queue: row.queue,
                owner: row.owner,
                progress: row.progress,
                attempts: row.attempts,
                max_retries: row.max_retries,
                worker_id: row.worker_id,
            })
        }
    }

}

#[cfg(feature = "sqlite")]
pub(crate) use sqlite::{NewSqliteJob, SqliteJob, SqliteProgressChanges};
