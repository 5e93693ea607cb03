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

//! Error types for CBF parsing.

use std::fmt;
use thiserror::Error;

/// The kind of error that occurred while reading a CBF document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CbfErrorKind {
    /// Line content exceeds the configured width.
    LineTooWide,
    /// Line is not a known keyword where a keyword was expected.
    UnrecognizedKeyword,
    /// Once-only keyword seen a second time.
    DuplicateKeyword,
    /// Keyword of an earlier group after a later group started.
    MisplacedKeyword,
    /// Document ended without a required keyword (VER, OBJSENSE).
    MissingRequiredKeyword,
    /// Input ended inside a block.
    UnexpectedEndOfFile,
    /// A query key depends on something that is not a structural count.
    MalformedStructuralDependency,
    /// A record references an undeclared variable, row or matrix entry.
    IndexOutOfRange,
    /// Stack dimensions do not add up to the declared total.
    InconsistentHeader,
    /// A field could not be parsed, or a record has the wrong shape.
    InvalidValue,
    /// Parsing exceeded the configured time limit.
    Timeout,
    /// I/O error.
    Io,
}

impl fmt::Display for CbfErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineTooWide => write!(f, "LineTooWide"),
            Self::UnrecognizedKeyword => write!(f, "UnrecognizedKeyword"),
            Self::DuplicateKeyword => write!(f, "DuplicateKeyword"),
            Self::MisplacedKeyword => write!(f, "MisplacedKeyword"),
            Self::MissingRequiredKeyword => write!(f, "MissingRequiredKeyword"),
            Self::UnexpectedEndOfFile => write!(f, "UnexpectedEndOfFile"),
            Self::MalformedStructuralDependency => write!(f, "MalformedStructuralDependency"),
            Self::IndexOutOfRange => write!(f, "IndexOutOfRange"),
            Self::InconsistentHeader => write!(f, "InconsistentHeader"),
            Self::InvalidValue => write!(f, "InvalidValue"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Io => write!(f, "IoError"),
        }
    }
}

/// An error raised while reading a CBF document.
///
/// Every error is terminal for the document it came from. `line` is 1-based;
/// it is 0 when the error is not tied to an input line (a malformed query,
/// or an I/O failure before the first line).
#[derive(Debug, Clone, Error)]
#[error("{kind} at line {line}: {message}")]
pub struct CbfError {
    /// The kind of error.
    pub kind: CbfErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Line number (1-based, 0 if unknown).
    pub line: usize,
    /// Raw text of the offending line.
    pub text: Option<String>,
}

impl CbfError {
    /// Create a new error.
    pub fn new(kind: CbfErrorKind, message: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            text: None,
        }
    }

    /// Attach the raw line text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach line number and text unless the error already carries them.
    pub fn at(mut self, line: usize, text: &str) -> Self {
        if self.line == 0 {
            self.line = line;
        }
        if self.text.is_none() {
            self.text = Some(text.to_string());
        }
        self
    }

    pub fn line_too_wide(width: usize, max: usize, line: usize) -> Self {
        Self::new(
            CbfErrorKind::LineTooWide,
            format!("line is {} characters wide, limit is {}", width, max),
            line,
        )
    }

    pub fn unrecognized_keyword(keyword: &str, line: usize) -> Self {
        Self::new(
            CbfErrorKind::UnrecognizedKeyword,
            format!("keyword '{}' not recognized", keyword),
            line,
        )
    }

    pub fn duplicate_keyword(keyword: impl fmt::Display, line: usize) -> Self {
        Self::new(
            CbfErrorKind::DuplicateKeyword,
            format!("keyword {} also found earlier and can only appear once", keyword),
            line,
        )
    }

    pub fn misplaced_keyword(keyword: impl fmt::Display, line: usize) -> Self {
        Self::new(
            CbfErrorKind::MisplacedKeyword,
            format!("keyword {} is not allowed after a later keyword group", keyword),
            line,
        )
    }

    pub fn missing_keyword(keyword: impl fmt::Display, line: usize) -> Self {
        Self::new(
            CbfErrorKind::MissingRequiredKeyword,
            format!("expected keyword {}", keyword),
            line,
        )
    }

    pub fn unexpected_eof(context: impl fmt::Display, line: usize) -> Self {
        Self::new(
            CbfErrorKind::UnexpectedEndOfFile,
            format!("unexpected end of file while reading {}", context),
            line,
        )
    }

    pub fn malformed_dependency(dependency: &str) -> Self {
        Self::new(
            CbfErrorKind::MalformedStructuralDependency,
            format!(
                "keyword '{}' not supported as structural dependency in partial file parsing",
                dependency
            ),
            0,
        )
    }

    pub fn index_out_of_range(what: &str, index: i64, bound: usize, line: usize) -> Self {
        Self::new(
            CbfErrorKind::IndexOutOfRange,
            format!("{} index {} out of range (declared {})", what, index, bound),
            line,
        )
    }

    pub fn inconsistent_header(message: impl Into<String>, line: usize) -> Self {
        Self::new(CbfErrorKind::InconsistentHeader, message, line)
    }

    pub fn invalid_value(message: impl Into<String>, line: usize) -> Self {
        Self::new(CbfErrorKind::InvalidValue, message, line)
    }

    pub fn timeout(elapsed: std::time::Duration, limit: std::time::Duration, line: usize) -> Self {
        Self::new(
            CbfErrorKind::Timeout,
            format!("parsing took {:?}, limit is {:?}", elapsed, limit),
            line,
        )
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(CbfErrorKind::Io, message, 0)
    }
}

impl From<std::io::Error> for CbfError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Result type for CBF operations.
pub type CbfResult<T> = Result<T, CbfError>;
