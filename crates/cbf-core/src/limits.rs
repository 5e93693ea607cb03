// Dweve CBF - Conic Benchmark Format toolkit
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Input limits for CBF parsing.

/// Width limit of a CBF line: content must fit in 512 bytes with room for `\r\n`.
pub const DEFAULT_MAX_LINE_WIDTH: usize = 510;

/// Configurable limits applied while reading a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum line width in characters, line terminator excluded (default: 510).
    pub max_line_width: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_line_width: DEFAULT_MAX_LINE_WIDTH,
        }
    }
}

impl Limits {
    /// Create limits with no restrictions (for testing).
    pub fn unlimited() -> Self {
        Self {
            max_line_width: usize::MAX,
        }
    }

    /// Check a line's width, returning the offending width if too wide.
    #[inline]
    pub fn check_width(&self, line: &str) -> Result<(), usize> {
        // Byte length bounds the char count from above.
        if line.len() <= self.max_line_width {
            return Ok(());
        }
        let width = line.chars().count();
        if width > self.max_line_width {
            Err(width)
        } else {
            Ok(())
        }
    }
}
