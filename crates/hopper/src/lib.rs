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

//! # Hopper
//!
//! Hopper is a small multi-tenant job queue backed by a single relational
//! table. Producers create jobs; workers claim them, report progress and
//! finish them as completed or failed.
//!
//! The interesting part is the claim protocol. Many workers may race for
//! the same queue and no two of them may ever hold the same job:
//!
//! - On PostgreSQL the oldest pending row is selected with
//!   `FOR UPDATE SKIP LOCKED` and updated in the same statement, so
//!   concurrent claimants fan out across distinct rows instead of queueing
//!   on one lock.
//! - On SQLite, which has no lock skipping, a claim is a conditional
//!   `UPDATE ... WHERE id = ? AND status = 'pending'`. Zero affected rows
//!   means another worker won and the next candidate is tried.
//!
//! Claims are best-effort FIFO per queue: strict when nothing is
//! contended, otherwise a worker may receive a slightly newer job while
//! the oldest one is locked by someone else.
//!
//! ## Lifecycle
//!
//! ```text
//! pending --claim--> processing --complete--> completed
//!                               \--fail-----> failed
//! ```
//!
//! There is no automatic retry and no lease expiry. `max_retries` is
//! stored for a policy layer to consult; a worker that crashes leaves its
//! job in `processing`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hopper::{Database, DAL, NewJob};
//! use serde_json::json;
//!
//! let db = Database::new("sqlite://jobs.db", 1)?;
//! db.run_migrations().await?;
//! let dal = DAL::new(db);
//!
//! let job = dal.jobs().create(NewJob::new("render", json!({"x": 1}))).await?;
//! if let Some(claimed) = dal.jobs().claim("render", "w1").await? {
//!     dal.jobs().complete(claimed.id, json!({"out": "file.mp4"})).await?;
//! }
//! ```

pub mod dal;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;

pub use dal::DAL;
pub use database::{BackendType, ClaimStrategy, Database};
pub use error::{DatabaseError, JobError};
pub use logging::init_logging;
pub use models::job::{
    Job, JobFilter, JobId, JobStatus, LogEntry, NewJob, ProgressUpdate, StatusCounts,
    MAX_LIST_LIMIT,
};
