// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sensor activity log buffer.

use std::collections::VecDeque;

use crate::protocol::ActivityResponse;

/// Default number of retained activity lines.
pub const DEFAULT_ACTIVITY_LINES: usize = 80;

/// Append-only, capped activity buffer with its `since` cursor.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    cursor: u64,
    lines: VecDeque<String>,
    max_lines: usize,
    appended: u64,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_LINES)
    }
}

impl ActivityLog {
    #[must_use]
    pub fn new(max_lines: usize) -> Self {
        Self {
            cursor: 0,
            lines: VecDeque::with_capacity(max_lines),
            max_lines,
            appended: 0,
        }
    }

    /// Append the lines of one response, dropping the oldest past the cap.
    ///
    /// The cursor follows the last non-zero sequence number seen. Returns
    /// the number of lines appended.
    pub fn ingest(&mut self, response: &ActivityResponse) -> usize {
        for entry in &response.lines {
            if let Some(seq) = entry.seq().filter(|seq| *seq != 0) {
                self.cursor = seq;
            }
            self.lines.push_back(entry.text().to_string());
            self.appended += 1;
        }
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
        response.lines.len()
    }

    /// Clear the buffer and rewind the cursor, e.g. before a sensor restart.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.cursor = 0;
        self.appended = 0;
    }

    /// Lines appended since creation or the last reset, including any
    /// already dropped by the cap.
    #[must_use]
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Value for the next request's `since` parameter.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
