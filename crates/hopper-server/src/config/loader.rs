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

use crate::config::{generate_default_config_toml, ConfigError, HopperConfig};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "HOPPER_CONFIG";

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from("./hopper.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("hopper").join("config.toml"));
        }

        search_paths.push(PathBuf::from("/etc/hopper/config.toml"));

        Self { search_paths }
    }

    /// Create a config loader with custom search paths
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Load configuration from the specified file or auto-discover.
    ///
    /// Order: explicit path, then `HOPPER_CONFIG`, then the search paths.
    pub fn load_config(&self, config_file: Option<&Path>) -> Result<HopperConfig, ConfigError> {
        let config_path = if let Some(path) = config_file {
            path.to_path_buf()
        } else if let Ok(env_config) = env::var(CONFIG_ENV_VAR) {
            PathBuf::from(env_config)
        } else {
            self.find_config_file().ok_or(ConfigError::ConfigNotFound)?
        };

        self.load_config_from_file(&config_path)
    }

    /// Like [`Self::load_config`], but falls back to the built-in defaults
    /// (with environment substitution applied) when no file exists.
    pub fn load_or_default(&self, config_file: Option<&Path>) -> Result<HopperConfig, ConfigError> {
        match self.load_config(config_file) {
            Err(ConfigError::ConfigNotFound) => {
                tracing::debug!("No configuration file found; using defaults");
                self.parse_str(&generate_default_config_toml()?)
            }
            other => other,
        }
    }

    /// Load configuration from a specific file
    pub fn load_config_from_file(&self, path: &Path) -> Result<HopperConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") | None => self.parse_str(&content),
            Some(ext) => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }

    /// Substitute environment variables and parse TOML.
    ///
    /// Sections missing from the file take their defaults, which may carry
    /// placeholders of their own, so the parsed config is substituted a
    /// second time.
    pub fn parse_str(&self, content: &str) -> Result<HopperConfig, ConfigError> {
        let substituted_content = self.substitute_env_vars(content)?;
        let config = toml::from_str::<HopperConfig>(&substituted_content)?;

        let normalized = toml::to_string(&config)?;
        Ok(toml::from_str::<HopperConfig>(
            &self.substitute_env_vars(&normalized)?,
        )?)
    }

    /// Find the first existing configuration file in search paths
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .find(|path| path.is_file())
            .cloned()
    }

    /// Substitute environment variables in configuration content
    fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        // ${VAR}, ${VAR:-default}, ${VAR:?error}
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::EnvSubstitutionError(e.to_string()))?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let replacement = self.process_var_expression(&cap[1])?;
            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    /// Process a variable expression like "VAR", "VAR:-default", or "VAR:?error"
    fn process_var_expression(&self, expr: &str) -> Result<String, ConfigError> {
        if let Some((var_name, default_value)) = expr.split_once(":-") {
            Ok(env::var(var_name).unwrap_or_else(|_| default_value.to_string()))
        } else if let Some((var_name, error_msg)) = expr.split_once(":?") {
            env::var(var_name).map_err(|_| {
                ConfigError::EnvSubstitutionError(format!(
                    "Required environment variable '{}' is not set: {}",
                    var_name, error_msg
                ))
            })
        } else {
            env::var(expr).map_err(|_| {
                ConfigError::EnvSubstitutionError(format!(
                    "Required environment variable '{}' is not set",
                    expr
                ))
            })
        }
    }

    /// Get all search paths for debugging
    pub fn get_search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
