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

//! Logging bootstrap for embedders and tests.
//!
//! The server installs its own subscriber; this helper exists for library
//! users and integration tests that want readable output without wiring
//! `tracing-subscriber` themselves.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence when set. Otherwise `level` is used, falling
/// back to `info`. Calling this more than once is harmless: later calls are
/// ignored once a global subscriber exists.
pub fn init_logging(level: Option<Level>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.unwrap_or(Level::INFO);
        EnvFilter::new(level.as_str().to_lowercase())
    });

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(filter)
        .try_init();
}
