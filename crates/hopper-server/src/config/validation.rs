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

use crate::config::{types::*, ValidationError};
use hopper::database::connection::validate_schema_name;
use hopper::database::BackendType;
use std::net::IpAddr;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for HopperConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors: Vec<ValidationError> = [
            self.database.validate(),
            self.server.validate(),
            self.auth.validate(),
            self.jobs.validate(),
            self.logging.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        BackendType::from_url(&self.url).map_err(|e| ValidationError::InvalidDatabaseUrl {
            message: e.to_string(),
        })?;

        if self.pool_size == 0 || self.pool_size > 100 {
            return Err(ValidationError::InvalidPoolSize {
                size: self.pool_size,
            });
        }

        if let Some(schema) = &self.schema {
            validate_schema_name(schema).map_err(|e| ValidationError::InvalidSchema {
                message: e.to_string(),
            })?;
        }

        Ok(())
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.bind_address.parse::<IpAddr>().is_err() {
            return Err(ValidationError::InvalidBindAddress {
                address: self.bind_address.clone(),
            });
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort { port: self.port });
        }
        if self.request_body_limit_bytes == 0 {
            return Err(ValidationError::InvalidBodyLimit {
                limit: self.request_body_limit_bytes,
            });
        }
        Ok(())
    }
}

impl Validate for AuthConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (which, token) in [
            ("producer", &self.producer_token),
            ("worker", &self.worker_token),
        ] {
            if token.trim().is_empty() {
                return Err(ValidationError::InvalidToken {
                    which,
                    message: "must not be empty".to_string(),
                });
            }
            if token.contains("${") {
                return Err(ValidationError::InvalidToken {
                    which,
                    message: "contains an unsubstituted variable".to_string(),
                });
            }
        }

        // One token must never unlock both capabilities.
        if self.producer_token == self.worker_token {
            return Err(ValidationError::InvalidToken {
                which: "worker",
                message: "must differ from the producer token".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for JobsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        hopper::models::job::validate_queue(&self.default_queue).map_err(|e| {
            ValidationError::InvalidJobDefaults {
                message: e.to_string(),
            }
        })?;
        if self.default_max_retries < 0 {
            return Err(ValidationError::InvalidJobDefaults {
                message: format!(
                    "default_max_retries must not be negative (got {})",
                    self.default_max_retries
                ),
            });
        }
        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidLogLevel {
                level: self.level.clone(),
            });
        }
        Ok(())
    }
}
