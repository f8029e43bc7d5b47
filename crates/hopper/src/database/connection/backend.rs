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

//! Database backend types and runtime backend selection.

#[cfg(feature = "postgres")]
use deadpool_diesel::postgres::Pool as PgPool;
#[cfg(feature = "sqlite")]
use deadpool_diesel::sqlite::Pool as SqlitePool;

use crate::error::DatabaseError;

// =============================================================================
// Runtime Database Backend Selection
// =============================================================================

/// Represents the database backend type, detected at runtime from the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// PostgreSQL backend
    #[cfg(feature = "postgres")]
    Postgres,
    /// SQLite backend
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// How a backend guarantees that a pending job is claimed by one worker only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStrategy {
    /// Lock the oldest pending row with `FOR UPDATE SKIP LOCKED` and update
    /// it in the same statement.
    SkipLocked,
    /// Conditional `UPDATE ... WHERE status = 'pending'`; zero affected rows
    /// means another claimant won and the next candidate is tried.
    CompareAndSet,
}

impl BackendType {
    /// Detect the backend type from a connection URL.
    ///
    /// SQLite URLs can be a `sqlite://` prefix, a `file:` URI (e.g.
    /// `file:test?mode=memory&cache=shared`), a relative or absolute path,
    /// or `:memory:`.
    pub fn from_url(url: &str) -> Result<Self, DatabaseError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            #[cfg(feature = "postgres")]
            return Ok(BackendType::Postgres);
            #[cfg(not(feature = "postgres"))]
            return Err(DatabaseError::BackendDisabled("postgres"));
        }

        if url.starts_with("sqlite://")
            || url.starts_with("file:")
            || url.starts_with('/')
            || url.starts_with("./")
            || url.starts_with("../")
            || url == ":memory:"
            || url.ends_with(".db")
            || url.ends_with(".sqlite")
            || url.ends_with(".sqlite3")
        {
            #[cfg(feature = "sqlite")]
            return Ok(BackendType::Sqlite);
            #[cfg(not(feature = "sqlite"))]
            return Err(DatabaseError::BackendDisabled("sqlite"));
        }

        Err(DatabaseError::UnsupportedUrl(url.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => "postgres",
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => "sqlite",
        }
    }

    /// The claim primitive this backend supports. SQLite has no row-level
    /// lock skipping, so it always uses compare-and-set.
    pub fn claim_strategy(&self) -> ClaimStrategy {
        match self {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => ClaimStrategy::SkipLocked,
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => ClaimStrategy::CompareAndSet,
        }
    }
}

/// Pool enum that wraps both PostgreSQL and SQLite connection pools.
#[derive(Clone)]
pub enum AnyPool {
    /// PostgreSQL connection pool
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
    /// SQLite connection pool
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

impl std::fmt::Debug for AnyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(pool) => write!(f, "AnyPool::Postgres({:?})", pool.status()),
            #[cfg(feature = "sqlite")]
            AnyPool::Sqlite(pool) => write!(f, "AnyPool::Sqlite({:?})", pool.status()),
        }
    }
}

impl AnyPool {
    /// Returns a reference to the PostgreSQL pool if this is a PostgreSQL backend.
    #[cfg(feature = "postgres")]
    pub fn as_postgres(&self) -> Option<&PgPool> {
        match self {
            AnyPool::Postgres(pool) => Some(pool),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Returns a reference to the SQLite pool if this is a SQLite backend.
    #[cfg(feature = "sqlite")]
    pub fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            AnyPool::Sqlite(pool) => Some(pool),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}
