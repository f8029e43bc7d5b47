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

//! Job Model
//!
//! This module defines the job record, its status graph and the inputs
//! accepted by the job operations. Validation and clamping happen here so
//! that every rule is checked before a connection is taken from the pool.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::universal_types::UniversalTimestamp;
use crate::error::JobError;

/// Job identifiers are assigned by the database and increase monotonically.
pub type JobId = i64;

/// Queue used when a producer does not name one.
pub const DEFAULT_QUEUE: &str = "default";
/// Retry ceiling recorded when a producer does not set one.
pub const DEFAULT_MAX_RETRIES: i32 = 3;
/// Upper bound on rows returned by a listing.
pub const MAX_LIST_LIMIT: i64 = 200;

pub const MAX_QUEUE_LEN: usize = 128;
pub const MAX_OWNER_LEN: usize = 256;
pub const MAX_WORKER_ID_LEN: usize = 256;

/// Key under `result` holding the progress log.
pub const LOGS_KEY: &str = "logs";

/// Lifecycle state of a job.
///
/// ```text
/// Pending -> Processing -> Completed
///                       -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn all() -> [JobStatus; 4] {
        [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ]
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    /// The only state from which `target` may be entered.
    pub fn required_source(target: JobStatus) -> Option<JobStatus> {
        match target {
            JobStatus::Pending => None,
            JobStatus::Processing => Some(JobStatus::Pending),
            JobStatus::Completed | JobStatus::Failed => Some(JobStatus::Processing),
        }
    }

    /// Checks that a job currently in `self` may move to `next`.
    pub fn ensure_transition(
        &self,
        id: JobId,
        operation: &'static str,
        next: JobStatus,
    ) -> Result<(), JobError> {
        if self.can_transition_to(next) {
            return Ok(());
        }
        Err(JobError::InvalidTransition {
            id,
            operation,
            // Pending has no source; report the state itself so the message stays readable.
            expected: JobStatus::required_source(next).unwrap_or(next),
            actual: *self,
        })
    }

    /// Checks that a job is in exactly `expected`, without moving it.
    pub fn ensure_is(
        &self,
        id: JobId,
        operation: &'static str,
        expected: JobStatus,
    ) -> Result<(), JobError> {
        if *self == expected {
            return Ok(());
        }
        Err(JobError::InvalidTransition {
            id,
            operation,
            expected,
            actual: *self,
        })
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// A job record (domain type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Partition the job is claimed from.
    pub queue: String,
    /// Free-text attribution; never used for exclusion.
    pub owner: Option<String>,
    /// Producer data, never interpreted here.
    pub payload: Value,
    pub status: JobStatus,
    /// Always within 0..=100.
    pub progress: i32,
    /// Progress log while processing, then the terminal result.
    pub result: Option<Value>,
    /// Number of successful claims.
    pub attempts: i32,
    /// Stored for a retry policy layer; not enforced here.
    pub max_retries: i32,
    /// Last or current claimant.
    pub worker_id: Option<String>,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

impl Job {
    /// Progress log entries recorded under `result.logs`, oldest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.result
            .as_ref()
            .and_then(|r| r.get(LOGS_KEY))
            .and_then(|logs| serde_json::from_value(logs.clone()).ok())
            .unwrap_or_default()
    }
}

/// Input for creating a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub queue: String,
    pub owner: Option<String>,
    pub payload: Value,
    pub max_retries: i32,
}

impl NewJob {
    pub fn new(queue: impl Into<String>, payload: Value) -> Self {
        Self {
            queue: queue.into(),
            owner: None,
            payload,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn validate(&self) -> Result<(), JobError> {
        validate_queue(&self.queue)?;
        if let Some(owner) = &self.owner {
            if owner.len() > MAX_OWNER_LEN {
                return Err(JobError::Validation(format!(
                    "owner must be at most {} characters",
                    MAX_OWNER_LEN
                )));
            }
        }
        if self.payload.is_null() {
            return Err(JobError::Validation("payload is required".to_string()));
        }
        if self.max_retries < 0 {
            return Err(JobError::Validation(format!(
                "max_retries must not be negative (got {})",
                self.max_retries
            )));
        }
        Ok(())
    }
}

pub fn validate_queue(queue: &str) -> Result<(), JobError> {
    if queue.trim().is_empty() {
        return Err(JobError::Validation("queue must not be empty".to_string()));
    }
    if queue.len() > MAX_QUEUE_LEN {
        return Err(JobError::Validation(format!(
            "queue must be at most {} characters",
            MAX_QUEUE_LEN
        )));
    }
    Ok(())
}

pub fn validate_worker_id(worker_id: &str) -> Result<(), JobError> {
    if worker_id.trim().is_empty() {
        return Err(JobError::Validation(
            "worker_id must not be empty".to_string(),
        ));
    }
    if worker_id.len() > MAX_WORKER_ID_LEN {
        return Err(JobError::Validation(format!(
            "worker_id must be at most {} characters",
            MAX_WORKER_ID_LEN
        )));
    }
    Ok(())
}

/// Filters for listing jobs. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    pub queue: Option<String>,
    pub owner: Option<String>,
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
}

impl JobFilter {
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Requested limit clamped to `1..=MAX_LIST_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(MAX_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// A progress report from the worker holding a job.
///
/// Progress outside 0..=100 is clamped rather than rejected, so a sloppy
/// worker still leaves a valid record behind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub progress: Option<i64>,
    pub message: Option<String>,
}

impl ProgressUpdate {
    pub fn progress(progress: i64) -> Self {
        Self {
            progress: Some(progress),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            progress: None,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn clamped_progress(&self) -> Option<i32> {
        self.progress.map(clamp_progress)
    }

    /// The message to append, if it carries any text.
    pub fn log_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), JobError> {
        if self.progress.is_none() && self.log_message().is_none() {
            return Err(JobError::Validation(
                "progress update needs a progress value or a message".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn clamp_progress(progress: i64) -> i32 {
    progress.clamp(0, 100) as i32
}

/// Number of jobs in each status, as reported by `count_by_status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl StatusCounts {
    pub fn get(&self, status: JobStatus) -> i64 {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Processing => self.processing,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }

    pub fn add(&mut self, status: JobStatus, count: i64) {
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// One entry of the append-only progress log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: UniversalTimestamp,
    pub message: String,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: UniversalTimestamp::now(),
            message: message.into(),
        }
    }
}

/// Returns `result` with `entry` appended to `result.logs`.
///
/// Existing entries are kept in order. A result that is not an object is
/// preserved under `value` so nothing a worker stored is lost.
pub fn append_log_entry(result: Option<Value>, entry: &LogEntry) -> Value {
    let mut object = match result {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    let entry = serde_json::to_value(entry).unwrap_or(Value::Null);
    match object.get_mut(LOGS_KEY) {
        Some(Value::Array(logs)) => logs.push(entry),
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, entry]);
        }
        None => {
            object.insert(LOGS_KEY.to_string(), Value::Array(vec![entry]));
        }
    }

    Value::Object(object)
}
