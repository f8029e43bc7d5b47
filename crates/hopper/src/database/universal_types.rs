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

//! Universal type wrappers for cross-database compatibility
//!
//! Domain code uses [`UniversalTimestamp`]; each backend model converts it
//! to its native column type at the DAL boundary:
//! - PostgreSQL stores `TIMESTAMP` (UTC, `NaiveDateTime`)
//! - SQLite stores fixed-width RFC 3339 `TEXT`
//!
//! The SQLite text form always carries six fractional digits and a `Z`
//! suffix, so lexical order of the column matches chronological order and
//! `ORDER BY created_at` behaves the same on both backends.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Universal timestamp wrapper, truncated to microseconds.
///
/// Both backends store microsecond precision, so truncating up front keeps
/// a value identical before and after a round trip through the database.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UniversalTimestamp(pub DateTime<Utc>);

impl UniversalTimestamp {
    pub fn now() -> Self {
        Self(Utc::now().trunc_subsecs(6))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    /// Fixed-width RFC 3339 text for SQLite storage.
    pub fn to_sqlite_text(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parses any RFC 3339 timestamp (SQLite TEXT).
    pub fn from_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|dt| UniversalTimestamp(dt.with_timezone(&Utc)))
    }

    /// Convert to NaiveDateTime for PostgreSQL TIMESTAMP storage
    pub fn to_naive(&self) -> NaiveDateTime {
        self.0.naive_utc()
    }

    /// Create from NaiveDateTime (PostgreSQL TIMESTAMP)
    pub fn from_naive(naive: NaiveDateTime) -> Self {
        UniversalTimestamp(Utc.from_utc_datetime(&naive))
    }
}

impl fmt::Display for UniversalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sqlite_text())
    }
}

impl From<DateTime<Utc>> for UniversalTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(6))
    }
}

impl From<UniversalTimestamp> for DateTime<Utc> {
    fn from(wrapper: UniversalTimestamp) -> Self {
        wrapper.0
    }
}

impl From<NaiveDateTime> for UniversalTimestamp {
    fn from(naive: NaiveDateTime) -> Self {
        Self::from_naive(naive)
    }
}
