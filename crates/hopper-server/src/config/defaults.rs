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

use crate::config::types::*;
use hopper::models::job::{DEFAULT_MAX_RETRIES, DEFAULT_QUEUE};

impl Default for HopperConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            jobs: JobsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "${HOPPER_DATABASE_URL:-sqlite://hopper.db}".to_string(),
            pool_size: 10,
            schema: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            request_body_limit_bytes: 1024 * 1024,
            graceful_shutdown_timeout_secs: 30,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            producer_token: "${HOPPER_PRODUCER_TOKEN:?set a producer token}".to_string(),
            worker_token: "${HOPPER_WORKER_TOKEN:?set a worker token}".to_string(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_queue: DEFAULT_QUEUE.to_string(),
            default_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "${HOPPER_LOG_LEVEL:-info}".to_string(),
            json: false,
            file: None,
        }
    }
}

/// Generate a complete default configuration as TOML string
pub fn generate_default_config_toml() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&HopperConfig::default())
}
