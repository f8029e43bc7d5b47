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

//! Tail of the server's own log file for `GET /logs`.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

pub const DEFAULT_TAIL_LINES: usize = 200;
pub const MAX_TAIL_LINES: usize = 10_000;

/// Severity names in increasing order of importance.
const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// Returns the last `lines` lines of `path` at or above `level`.
///
/// The file is streamed; at most `lines` lines are held at once.
pub fn tail_file(path: &Path, lines: usize, level: Option<&str>) -> io::Result<Vec<String>> {
    let limit = lines.min(MAX_TAIL_LINES);
    if limit == 0 {
        return Ok(Vec::new());
    }
    let min_level = level.and_then(parse_level);
    let mut tail = VecDeque::with_capacity(limit);

    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        if min_level.is_some_and(|min| !should_include_line(&line, min)) {
            continue;
        }
        if tail.len() == limit {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Ok(tail.into())
}

/// Parses a level name, case-insensitively. `warning` is accepted for `warn`.
pub fn parse_level(level: &str) -> Option<usize> {
    let upper = level.trim().to_uppercase();
    let upper = if upper == "WARNING" { "WARN".to_string() } else { upper };
    LEVELS.iter().position(|l| *l == upper)
}

/// Lines without a recognisable level are continuation lines and are kept.
fn should_include_line(line: &str, min: usize) -> bool {
    match line_level(line) {
        Some(level) => level >= min,
        None => true,
    }
}

/// The level token that appears first in the line.
fn line_level(line: &str) -> Option<usize> {
    LEVELS
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| line.find(name).map(|pos| (pos, idx)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, idx)| idx)
}
