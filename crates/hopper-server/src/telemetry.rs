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

//! Tracing subscriber and Prometheus recorder setup.

use std::path::Path;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the global subscriber.
///
/// Logs go to stdout, and additionally to `logging.file` when set. The
/// returned guard flushes the file writer and must be held until exit.
/// `RUST_LOG` overrides the configured level; `verbose` forces `debug`.
pub fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let (file_writer, guard) = match &logging.file {
        Some(path) => {
            let (writer, guard) = file_appender(path)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let json = logging.json;
    let stdout_json = json.then(|| fmt::layer().json());
    let stdout_text = (!json).then(fmt::layer);
    let file_json = file_writer
        .clone()
        .filter(|_| json)
        .map(|w| fmt::layer().json().with_writer(w));
    let file_text = file_writer
        .filter(|_| !json)
        .map(|w| fmt::layer().with_ansi(false).with_writer(w));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_json)
        .with(stdout_text)
        .with(file_json)
        .with(file_text)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn file_appender(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Installs the process-wide Prometheus recorder, once.
pub fn install_metrics_recorder() -> Result<PrometheusHandle> {
    PROMETHEUS
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .context("Failed to install Prometheus recorder")?;
            describe_metrics();
            Ok(handle)
        })
        .cloned()
}

fn describe_metrics() {
    metrics::describe_counter!("hopper_jobs_created_total", "Jobs accepted by the store");
    metrics::describe_counter!("hopper_jobs_claimed_total", "Jobs handed to a worker");
    metrics::describe_counter!("hopper_jobs_completed_total", "Jobs marked completed");
    metrics::describe_counter!("hopper_jobs_failed_total", "Jobs marked failed");
    metrics::describe_counter!(
        "hopper_claim_conflicts_total",
        "Claim candidates lost to a concurrent worker"
    );
}
