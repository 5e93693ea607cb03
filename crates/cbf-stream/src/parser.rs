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

//! Snapshot parser.
//!
//! [`SnapshotParser`] drives a [`ProblemBuilder`] over a [`LineReader`] and
//! yields one [`ProblemModel`] per snapshot: one for every `CHANGE` marker
//! and one at the end of input (or when the query is satisfied early).
//!
//! # Partial parsing
//!
//! ```rust
//! use cbf_core::KeyQuery;
//! use cbf_stream::{ParserConfig, SnapshotParser};
//! use std::io::Cursor;
//!
//! let input = "VER\n3\nOBJSENSE\nMIN\nVAR\n4 1\nF 4\nCON\n1 1\nL+ 1\n";
//! let config = ParserConfig {
//!     query: KeyQuery::parse(["VAR:HEAD"]).unwrap(),
//!     ..Default::default()
//! };
//! let mut parser = SnapshotParser::with_config(Cursor::new(input), "demo", config);
//! let model = parser.next().unwrap().unwrap();
//! assert_eq!(model.varnum(), 4);
//! assert!(model.variables().stacks.is_empty());
//! assert!(parser.next().is_none());
//! ```

use crate::builder::{Flow, ParseState, ProblemBuilder};
use crate::reader::{LineReader, DEFAULT_BUFFER_SIZE};
use cbf_core::{CbfResult, KeyQuery, Limits, ProblemModel};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Configuration options for the snapshot parser.
///
/// # Examples
///
/// ```rust
/// use cbf_stream::ParserConfig;
///
/// let config = ParserConfig::default();
/// assert_eq!(config.limits.max_line_width, 510);
/// assert_eq!(config.buffer_size, 64 * 1024);
/// assert!(config.query.is_exhaustive());
/// assert_eq!(config.timeout, None);
/// ```
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Input limits.
    pub limits: Limits,

    /// Buffer size for reading input.
    ///
    /// Default: 64KB
    pub buffer_size: usize,

    /// Keys to parse. The default parses everything and never stops early.
    pub query: KeyQuery,

    /// Timeout for parsing a whole document.
    ///
    /// Checked periodically, so the actual time taken may slightly exceed
    /// the limit.
    ///
    /// Default: None (no timeout)
    pub timeout: Option<Duration>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            query: KeyQuery::all(),
            timeout: None,
        }
    }
}

impl ParserConfig {
    /// Default configuration with another query.
    pub fn with_query(query: KeyQuery) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }
}

/// Pull-based producer of problem snapshots.
///
/// The iterator is fused: after the final snapshot or an error it yields
/// `None`, and the underlying reader is dropped as soon as that happens.
pub struct SnapshotParser<R: Read> {
    reader: Option<LineReader<R>>,
    builder: ProblemBuilder,
    awaiting_change: bool,
}

impl<R: Read> SnapshotParser<R> {
    /// Parse everything from `reader` with the default configuration.
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self::with_config(reader, name, ParserConfig::default())
    }

    pub fn with_config(reader: R, name: impl Into<String>, config: ParserConfig) -> Self {
        let reader = LineReader::with_capacity(reader, config.buffer_size).with_limits(config.limits);
        Self::from_reader(reader, name, config.query, config.timeout)
    }

    fn from_reader(
        reader: LineReader<R>,
        name: impl Into<String>,
        query: KeyQuery,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            reader: Some(reader),
            builder: ProblemBuilder::new(name, query).with_timeout(timeout),
            awaiting_change: false,
        }
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        self.builder.name()
    }

    pub fn state(&self) -> ParseState {
        if self.reader.is_none() {
            ParseState::Done
        } else if self.awaiting_change {
            ParseState::AwaitingChange
        } else {
            self.builder.state()
        }
    }

    /// Collect every remaining snapshot, stopping at the first error.
    pub fn collect_all(self) -> CbfResult<Vec<ProblemModel>> {
        self.collect()
    }

    fn advance(&mut self, reader: &mut LineReader<R>) -> CbfResult<(ProblemModel, bool)> {
        if self.awaiting_change {
            self.awaiting_change = false;
            self.builder.begin_pass();
        }

        loop {
            if self.builder.is_exhausted() {
                debug!(line = reader.line_number(), "query satisfied, stopping early");
                return Ok((self.builder.snapshot(false), true));
            }

            let Some(line) = reader.next_significant()? else {
                self.builder.finish()?;
                return Ok((self.builder.snapshot(false), true));
            };

            match self.builder.accept(&line, reader)? {
                Flow::Continue => {}
                Flow::Change => {
                    self.awaiting_change = true;
                    return Ok((self.builder.snapshot(true), false));
                }
                Flow::Stop => {
                    debug!(line = line.number, "query satisfied, stopping early");
                    return Ok((self.builder.snapshot(false), true));
                }
            }
        }
    }
}

impl SnapshotParser<Box<dyn Read + Send>> {
    /// Open a file; `.gz` files are decompressed transparently and the
    /// instance name is derived from the path.
    pub fn open(path: impl AsRef<Path>, config: ParserConfig) -> CbfResult<Self> {
        let (name, reader) = LineReader::open_with_capacity(path, config.buffer_size)?;
        let reader = reader.with_limits(config.limits);
        Ok(Self::from_reader(reader, name, config.query, config.timeout))
    }
}

impl<R: Read> Iterator for SnapshotParser<R> {
    type Item = CbfResult<ProblemModel>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut reader = self.reader.take()?;
        match self.advance(&mut reader) {
            Ok((model, last)) => {
                if !last {
                    self.reader = Some(reader);
                }
                Some(Ok(model))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl<R: Read> std::iter::FusedIterator for SnapshotParser<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use cbf_core::CbfErrorKind;
    use std::io::Cursor;

    const SMALL: &str = "VER\n3\nOBJSENSE\nMAX\nVAR\n1 1\nL+ 1\nOBJACOORD\n1\n0 2.5\n";

    #[test]
    fn test_single_snapshot() {
        let mut parser = SnapshotParser::new(Cursor::new(SMALL), "small");
        assert_eq!(parser.state(), ParseState::ExpectVersion);

        let model = parser.next().unwrap().unwrap();
        assert_eq!(model.name, "small");
        assert_eq!(model.version(), Some(3));
        assert!(!model.has_change_marker);
        assert_eq!(model.coefficients.objective_linear.entries.len(), 1);

        assert_eq!(parser.state(), ParseState::Done);
        assert!(parser.next().is_none());
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_state_after_change() {
        let input = format!("{}CHANGE\nOBJACOORD\n1\n0 1.0\n", SMALL);
        let mut parser = SnapshotParser::new(Cursor::new(input), "s");
        let first = parser.next().unwrap().unwrap();
        assert!(first.has_change_marker);
        assert_eq!(parser.state(), ParseState::AwaitingChange);

        let second = parser.next().unwrap().unwrap();
        assert!(!second.has_change_marker);
        assert_eq!(second.snapshot, 1);
        assert_eq!(second.coefficients.objective_linear.nnz, 2);
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_error_fuses_iterator() {
        let mut parser = SnapshotParser::new(Cursor::new("VER\n3\nNOPE\n"), "bad");
        let err = parser.next().unwrap().unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::UnrecognizedKeyword);
        assert_eq!(err.line, 3);
        assert_eq!(parser.state(), ParseState::Done);
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_empty_query_reads_nothing() {
        let config = ParserConfig::with_query(KeyQuery::new());
        let mut parser = SnapshotParser::with_config(Cursor::new(SMALL), "q", config);
        let model = parser.next().unwrap().unwrap();
        assert_eq!(model.version(), None);
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_collect_all() {
        let snapshots = SnapshotParser::new(Cursor::new(SMALL), "c").collect_all().unwrap();
        assert_eq!(snapshots.len(), 1);

        let err = SnapshotParser::new(Cursor::new("VER\n"), "c")
            .collect_all()
            .unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::UnexpectedEndOfFile);
    }

    #[test]
    fn test_open_uses_configured_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.cbf");
        std::fs::write(&path, SMALL).unwrap();

        let config = ParserConfig {
            buffer_size: 32,
            ..Default::default()
        };
        let mut parser = SnapshotParser::open(&path, config).unwrap();
        let capacity = parser.reader.as_ref().map(LineReader::buffer_capacity);
        assert_eq!(capacity, Some(32));

        let model = parser.next().unwrap().unwrap();
        assert_eq!(model.name, "small");
        assert_eq!(model.varnum(), 1);
    }
}
