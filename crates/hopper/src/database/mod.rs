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

//! Database layer: connection pooling, schema definitions, migrations and
//! the timestamp type shared by both backends.
//!
//! The backend is chosen at runtime from the connection URL. PostgreSQL and
//! SQLite each have their own diesel table definitions and migration set,
//! embedded into the binary at compile time.

pub mod connection;
pub mod schema;
pub mod universal_types;

pub use connection::{AnyPool, BackendType, ClaimStrategy, Database};
pub use universal_types::UniversalTimestamp;

use diesel_migrations::{embed_migrations, EmbeddedMigrations};

/// Migrations applied to PostgreSQL databases (and tenant schemas).
#[cfg(feature = "postgres")]
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

/// Migrations applied to SQLite databases.
#[cfg(feature = "sqlite")]
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");
