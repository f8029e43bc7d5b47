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

//! Tenant schema name validation.
//!
//! Each tenant lives in its own PostgreSQL schema. The name ends up inside
//! `CREATE SCHEMA` and `SET search_path` statements, which cannot take bind
//! parameters, so it is checked against a strict identifier grammar first.

use thiserror::Error;

/// Maximum length for PostgreSQL identifiers (NAMEDATALEN - 1).
const MAX_SCHEMA_NAME_LENGTH: usize = 63;

/// Schemas a tenant may never be placed in.
const RESERVED_SCHEMA_NAMES: &[&str] = &["public", "pg_catalog", "information_schema", "pg_temp"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Schema name length invalid: '{name}' (must be 1-{max} characters)")]
    InvalidLength { name: String, max: usize },

    #[error("Schema name must start with a letter or underscore: '{0}'")]
    InvalidStart(String),

    #[error(
        "Schema name contains invalid characters (only alphanumeric and underscore allowed): '{0}'"
    )]
    InvalidCharacters(String),

    #[error("Schema name is reserved: '{0}'")]
    ReservedName(String),
}

/// Validates a tenant schema name, returning it unchanged on success.
///
/// ```
/// use hopper::database::connection::validate_schema_name;
///
/// assert!(validate_schema_name("tenant_acme").is_ok());
/// assert!(validate_schema_name("public").is_err());
/// assert!(validate_schema_name("acme; DROP TABLE jobs").is_err());
/// ```
pub fn validate_schema_name(name: &str) -> Result<&str, SchemaError> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) if name.len() <= MAX_SCHEMA_NAME_LENGTH => c,
        _ => {
            return Err(SchemaError::InvalidLength {
                name: name.to_string(),
                max: MAX_SCHEMA_NAME_LENGTH,
            })
        }
    };

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(SchemaError::InvalidStart(name.to_string()));
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SchemaError::InvalidCharacters(name.to_string()));
    }

    if RESERVED_SCHEMA_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(SchemaError::ReservedName(name.to_string()));
    }

    Ok(name)
}
