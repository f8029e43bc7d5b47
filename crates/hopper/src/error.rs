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

//! Error types for job operations and database setup.

use thiserror::Error;

use crate::models::job::{JobId, JobStatus};

/// Errors returned by job store, claim, state and progress operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Input was missing or malformed. Raised before any write happens.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No job exists with this id.
    #[error("Job {id} not found")]
    NotFound { id: JobId },

    /// The job is not in the state the operation requires.
    #[error("Cannot {operation} job {id}: status is '{actual}', expected '{expected}'")]
    InvalidTransition {
        id: JobId,
        operation: &'static str,
        expected: JobStatus,
        actual: JobStatus,
    },

    /// A claim candidate was taken by another transaction between selection
    /// and update. Only used inside the claim loop; callers never see it.
    #[error("Job {id} was claimed concurrently")]
    ConcurrencyConflict { id: JobId },

    /// The database rejected a query or the transaction failed to commit.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// No pooled connection could be obtained or the blocking task failed.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// A stored row could not be mapped back to a job.
    #[error("Corrupt job record {id}: {reason}")]
    CorruptRecord { id: JobId, reason: String },
}

impl JobError {
    /// True for failures of the storage layer rather than of the request.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            JobError::Database(_) | JobError::ConnectionPool(_) | JobError::CorruptRecord { .. }
        )
    }
}

/// Errors raised while configuring or migrating the database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(
        "Unable to detect database backend from URL '{0}'. \
         Expected postgres://, postgresql://, sqlite://, or a file path."
    )]
    UnsupportedUrl(String),

    #[error("The {0} backend is not enabled in this build")]
    BackendDisabled(&'static str),

    #[error("Invalid PostgreSQL URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid tenant schema: {0}")]
    Schema(#[from] crate::database::connection::SchemaError),

    #[error("Failed to build connection pool: {0}")]
    PoolBuild(String),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("{0}")]
    Unsupported(String),
}
