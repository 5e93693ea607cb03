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

//! Line reader for the streaming parser.
//!
//! CBF is line oriented and partly positional: keywords are looked up only
//! where a keyword may start, and there blank lines and `#` comments are
//! skipped. Count lines and block payloads are read line by line with no
//! skipping. [`LineReader`] offers both cursors over one buffered input.

use cbf_core::{CbfError, CbfResult, Limits};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Default read buffer capacity.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// A physical input line with its 1-based number.
///
/// `text` has the line terminator removed and surrounding whitespace
/// trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub text: String,
}

impl Line {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// Blank lines and `#` comments.
    #[inline]
    pub fn is_insignificant(&self) -> bool {
        self.text.is_empty() || self.text.starts_with('#')
    }

    /// Split the line into exactly `N` whitespace-separated fields.
    pub fn fields<const N: usize>(&self) -> CbfResult<[&str; N]> {
        let parts: Vec<&str> = self.text.split_whitespace().collect();
        <[&str; N]>::try_from(parts).map_err(|parts| {
            CbfError::invalid_value(
                format!("expected {} fields, found {}", N, parts.len()),
                self.number,
            )
            .with_text(self.text.as_str())
        })
    }
}

/// Buffered line reader with line number tracking.
///
/// # Examples
///
/// ```rust
/// use cbf_stream::LineReader;
/// use std::io::Cursor;
///
/// let input = "# comment\n\nVER\n3\n";
/// let mut reader = LineReader::new(Cursor::new(input));
///
/// let kw = reader.next_significant().unwrap().unwrap();
/// assert_eq!((kw.number, kw.text.as_str()), (3, "VER"));
/// let value = reader.next_raw().unwrap().unwrap();
/// assert_eq!(value.text, "3");
/// assert!(reader.next_raw().unwrap().is_none());
/// ```
pub struct LineReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    buffer: String,
    limits: Limits,
}

impl<R: Read> LineReader<R> {
    /// Create a new line reader with default limits.
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_BUFFER_SIZE)
    }

    /// Create with a specific buffer capacity.
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            line_number: 0,
            buffer: String::new(),
            limits: Limits::default(),
        }
    }

    /// Replace the limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Capacity of the read buffer.
    pub fn buffer_capacity(&self) -> usize {
        self.reader.capacity()
    }

    /// Number of the last physical line read.
    #[inline]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read the next physical line, whatever it contains.
    pub fn next_raw(&mut self) -> CbfResult<Option<Line>> {
        self.buffer.clear();
        if self.reader.read_line(&mut self.buffer)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        let content = self.buffer.trim_end_matches(['\r', '\n']);
        if let Err(width) = self.limits.check_width(content) {
            return Err(
                CbfError::line_too_wide(width, self.limits.max_line_width, self.line_number)
                    .with_text(content),
            );
        }

        Ok(Some(Line::new(self.line_number, content.trim())))
    }

    /// Read the next line that is neither blank nor a comment.
    pub fn next_significant(&mut self) -> CbfResult<Option<Line>> {
        while let Some(line) = self.next_raw()? {
            if !line.is_insignificant() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Read the next physical line, failing at end of input.
    pub fn expect_raw(&mut self, context: &str) -> CbfResult<Line> {
        self.next_raw()?
            .ok_or_else(|| CbfError::unexpected_eof(context, self.line_number))
    }

    /// Consume `count` physical lines without interpreting them.
    pub fn skip_raw(&mut self, count: usize, context: &str) -> CbfResult<()> {
        for _ in 0..count {
            self.expect_raw(context)?;
        }
        Ok(())
    }
}

impl LineReader<Box<dyn Read + Send>> {
    /// Open a CBF file, decompressing `.gz` files transparently.
    ///
    /// Returns the instance name derived from the path together with the
    /// reader.
    pub fn open(path: impl AsRef<Path>) -> CbfResult<(String, Self)> {
        Self::open_with_capacity(path, DEFAULT_BUFFER_SIZE)
    }

    /// Like [`LineReader::open`], with a specific buffer capacity.
    pub fn open_with_capacity(
        path: impl AsRef<Path>,
        capacity: usize,
    ) -> CbfResult<(String, Self)> {
        let path = path.as_ref();
        let (name, compressed) = instance_name(path);
        let file = File::open(path)
            .map_err(|e| CbfError::io(format!("{}: {}", path.display(), e)))?;
        let inner: Box<dyn Read + Send> = if compressed {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok((name, Self::with_capacity(inner, capacity)))
    }
}

/// Instance name of a path, and whether the file is gzip compressed.
///
/// The name is the file name without its extension; for `.gz` files one
/// further extension is removed, so `a/b/x.cbf.gz` names instance `x`.
pub fn instance_name(path: &Path) -> (String, bool) {
    let file = Path::new(path.file_name().unwrap_or(path.as_os_str()));
    let compressed = file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    let stem = file.file_stem().unwrap_or(file.as_os_str());
    let name = if compressed {
        Path::new(stem).file_stem().unwrap_or(stem)
    } else {
        stem
    };
    (name.to_string_lossy().into_owned(), compressed)
}
