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

//! Data Access Layer with runtime backend selection
//!
//! The DAL works against both PostgreSQL and SQLite, choosing the
//! implementation at runtime from the backend of the wrapped [`Database`].
//! Every operation takes a pooled connection, runs its statements inside a
//! single transaction on the blocking pool, and converts the backend row
//! type into the domain [`Job`](crate::models::job::Job) at the boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use hopper::{Database, DAL};
//!
//! let db = Database::new("postgres://localhost/hopper", 10)?;
//! let dal = DAL::new(db);
//!
//! let next = dal.jobs().claim("render", "worker-1").await?;
//! ```

use crate::database::{AnyPool, BackendType, Database};

pub mod job;
pub(crate) mod models;

pub use job::JobDAL;

/// Dispatches to the PostgreSQL or SQLite expression for a backend.
///
/// ```rust,ignore
/// crate::dispatch_backend!(
///     self.dal.backend(),
///     self.get_postgres(id).await,
///     self.get_sqlite(id).await
/// )
/// ```
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $pg_expr:expr, $sqlite_expr:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $pg_expr,
            #[cfg(feature = "sqlite")]
            $crate::database::BackendType::Sqlite => $sqlite_expr,
        }
    };
}

/// The Data Access Layer.
///
/// `DAL` is `Clone` and can be shared between tasks; every clone uses the
/// same connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns the backend type for this DAL instance.
    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn pool(&self) -> AnyPool {
        self.database.pool()
    }

    /// Returns the job DAL: storage, claiming, state transitions and progress.
    pub fn jobs(&self) -> JobDAL<'_> {
        JobDAL::new(self)
    }
}
