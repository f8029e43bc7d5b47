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

//! Errors raised while locating, reading and checking `hopper.toml`.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No hopper.toml found; pass --config or set HOPPER_CONFIG")]
    ConfigNotFound,

    #[error("Cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Cannot render configuration: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("Variable substitution failed: {0}")]
    EnvSubstitutionError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Configuration must be a .toml file, got .{extension}")]
    UnsupportedFormat { extension: String },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("database.url: {message}")]
    InvalidDatabaseUrl { message: String },

    #[error("database.pool_size: {size} is outside 1..=100")]
    InvalidPoolSize { size: u32 },

    #[error("database.schema: {message}")]
    InvalidSchema { message: String },

    #[error("server.bind_address: '{address}' is not an IP address")]
    InvalidBindAddress { address: String },

    #[error("server.port: {port} cannot be bound")]
    InvalidPort { port: u16 },

    #[error("server.request_body_limit_bytes: {limit} must be positive")]
    InvalidBodyLimit { limit: usize },

    #[error("auth.{which}_token: {message}")]
    InvalidToken {
        which: &'static str,
        message: String,
    },

    #[error("jobs: {message}")]
    InvalidJobDefaults { message: String },

    #[error("logging.level: '{level}' is not one of error, warn, info, debug, trace")]
    InvalidLogLevel { level: String },

    #[error("{}", MultipleErrors(.errors))]
    Multiple { errors: Vec<ValidationError> },
}

/// Renders nested validation errors one per line.
struct MultipleErrors<'a>(&'a [ValidationError]);

impl fmt::Display for MultipleErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problems", self.0.len())?;
        for err in self.0 {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}
