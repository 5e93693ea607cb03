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

//! Problem builder state machine.
//!
//! [`ProblemBuilder`] consumes one keyword line at a time, validates it
//! against the keyword grammar, and reads the block that follows. Whether a
//! block's payload is materialized, skipped, or left unread is decided by
//! the query resolver.

use crate::reader::{Line, LineReader};
use cbf_core::model::{
    AEntry, BEntry, DEntry, FEntry, HEntry, Listed, ObjAEntry, ObjFEntry, Table,
};
use cbf_core::{
    simple_bounds_possible, CbfError, CbfResult, Coefficients, Domain, GrammarState, KeyQuery,
    Keyword, KeywordGroup, ObjectiveSense, ProblemModel, QueryResolver, SimpleBoundTracker, Stack,
    Stacks, Step, Structure,
};
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Timeout is checked once per this many ticks.
const TIMEOUT_CHECK_INTERVAL: usize = 256;

/// Upper limit on capacity reserved from a declared count before any
/// payload line has been read.
const MAX_PREALLOCATION: usize = 4096;

/// Position of the builder in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Before `VER`.
    ExpectVersion,
    /// Inside the structural group.
    ExpectStructural,
    /// Inside a data pass.
    ExpectData,
    /// A snapshot was yielded at `CHANGE`; the next pull starts a new pass.
    AwaitingChange,
    /// Input is exhausted, the query is satisfied, or an error occurred.
    Done,
}

/// What the caller should do after a keyword was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next keyword.
    Continue,
    /// A `CHANGE` marker closed the current pass.
    Change,
    /// The query is satisfied; nothing more needs to be read.
    Stop,
}

/// Fate of a block's payload lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Read,
    Skip,
    /// Parsing stops right after this block, so the lines stay unread.
    Leave,
}

/// Wall-clock guard for untrusted input.
#[derive(Debug)]
struct Clock {
    start: Instant,
    limit: Option<Duration>,
    ticks: usize,
}

impl Clock {
    fn new(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
            ticks: 0,
        }
    }

    #[inline]
    fn tick(&mut self, line: usize) -> CbfResult<()> {
        let Some(limit) = self.limit else {
            return Ok(());
        };
        self.ticks += 1;
        if self.ticks % TIMEOUT_CHECK_INTERVAL == 1 {
            let elapsed = self.start.elapsed();
            if elapsed > limit {
                return Err(CbfError::timeout(elapsed, limit, line));
            }
        }
        Ok(())
    }
}

/// Builds [`ProblemModel`] snapshots from keyword blocks.
#[derive(Debug)]
pub struct ProblemBuilder {
    name: String,
    structure: Arc<Structure>,
    coefficients: Coefficients,
    grammar: GrammarState,
    resolver: QueryResolver,
    tracker: Option<SimpleBoundTracker>,
    /// Line of an `INT` block read before `VAR`, still to be range checked.
    unchecked_integers: Option<usize>,
    snapshots: usize,
    clock: Clock,
}

impl ProblemBuilder {
    pub fn new(name: impl Into<String>, query: KeyQuery) -> Self {
        Self {
            name: name.into(),
            structure: Arc::new(Structure::default()),
            coefficients: Coefficients::default(),
            grammar: GrammarState::new(),
            resolver: QueryResolver::new(query),
            tracker: None,
            unchecked_integers: None,
            snapshots: 0,
            clock: Clock::new(None),
        }
    }

    /// Fail with `Timeout` once parsing has taken longer than `limit`.
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.clock = Clock::new(limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the keyword grammar.
    pub fn state(&self) -> ParseState {
        match self.grammar.group() {
            KeywordGroup::FileDescriptor => ParseState::ExpectVersion,
            KeywordGroup::Structural => ParseState::ExpectStructural,
            KeywordGroup::Data => ParseState::ExpectData,
        }
    }

    /// Whether the query needs nothing more from the document.
    pub fn is_exhausted(&self) -> bool {
        self.resolver.is_exhausted()
    }

    /// Handle a keyword line and the block that follows it.
    pub fn accept<R: Read>(&mut self, line: &Line, reader: &mut LineReader<R>) -> CbfResult<Flow> {
        self.clock.tick(line.number)?;

        let kw = Keyword::parse(&line.text).ok_or_else(|| {
            CbfError::unrecognized_keyword(&line.text, line.number).with_text(line.text.as_str())
        })?;

        let before = self.grammar.group();
        let step = self
            .grammar
            .accept(kw)
            .map_err(|e| e.at(line.number, &line.text))?;
        let after = self.grammar.group();
        if after != before {
            self.enter_group(before, after)?;
            if self.resolver.is_exhausted() {
                return Ok(Flow::Stop);
            }
        }

        if step == Step::Change {
            return Ok(Flow::Change);
        }

        trace!(keyword = %kw, line = line.number, "reading block");
        match kw {
            Keyword::Ver => self.read_version(reader)?,
            Keyword::ObjSense => self.read_objective_sense(reader)?,
            Keyword::PsdVar => {
                let list = self.read_listed(kw, reader, parse_count)?;
                Arc::make_mut(&mut self.structure).psd_variables = list;
            }
            Keyword::PsdCon => {
                let list = self.read_listed(kw, reader, parse_count)?;
                Arc::make_mut(&mut self.structure).psd_maps = list;
            }
            Keyword::Int => {
                // Without VAR the indices are checked once it is known.
                let bound = self
                    .grammar
                    .seen()
                    .contains(Keyword::Var)
                    .then(|| self.structure.varnum());
                let list = self.read_listed(kw, reader, |field, line| match bound {
                    Some(n) => parse_index(field, "integer variable", n, line),
                    None => parse_count(field, line),
                })?;
                if bound.is_none() && list.is_materialized() {
                    self.unchecked_integers = Some(line.number);
                }
                Arc::make_mut(&mut self.structure).integer_variables = list;
            }
            Keyword::Var => {
                let stacks = self.read_stacks(kw, reader)?;
                Arc::make_mut(&mut self.structure).variables = stacks;
                self.check_integer_indices()?;
            }
            Keyword::Con => {
                let stacks = self.read_stacks(kw, reader)?;
                Arc::make_mut(&mut self.structure).maps = stacks;
            }
            Keyword::ObjBCoord => {
                let value = reader.expect_raw(kw.name())?;
                let [field] = value.fields::<1>()?;
                self.coefficients.objective_constant = parse_float(field, &value)?;
                self.resolver.satisfy(kw);
            }
            Keyword::Change => {}
            _ => self.read_coordinates(kw, reader)?,
        }

        if self.resolver.is_exhausted() {
            Ok(Flow::Stop)
        } else {
            Ok(Flow::Continue)
        }
    }

    /// Start the data pass that follows a `CHANGE` marker.
    pub fn begin_pass(&mut self) {
        self.resolver.restart_pass();
        debug!(snapshot = self.snapshots, "starting data pass");
    }

    /// Check that the document is complete at end of input.
    pub fn finish(&mut self) -> CbfResult<()> {
        self.grammar.finish()?;
        self.check_integer_indices()
    }

    /// Range check `INT` indices that were read before the variable count
    /// was known.
    fn check_integer_indices(&mut self) -> CbfResult<()> {
        let Some(keyword_line) = self.unchecked_integers.take() else {
            return Ok(());
        };
        let varnum = self.structure.varnum();
        for (i, &j) in self.structure.integer_variables.items.iter().enumerate() {
            if j >= varnum {
                // Payload lines follow the keyword and its count line.
                return Err(CbfError::index_out_of_range(
                    "integer variable",
                    j as i64,
                    varnum,
                    keyword_line + 2 + i,
                ));
            }
        }
        Ok(())
    }

    /// Produce the current snapshot.
    pub fn snapshot(&mut self, has_change_marker: bool) -> ProblemModel {
        let bounds = self.tracker.as_ref().map(|t| t.derive(&self.structure));
        let model = ProblemModel {
            name: self.name.clone(),
            snapshot: self.snapshots,
            structure: Arc::clone(&self.structure),
            coefficients: self.coefficients.clone(),
            has_change_marker,
            bounds,
        };
        debug!(
            name = %self.name,
            snapshot = self.snapshots,
            change = has_change_marker,
            bounds = model.bounds.is_some(),
            "snapshot complete"
        );
        self.snapshots += 1;
        model
    }

    fn enter_group(&mut self, from: KeywordGroup, to: KeywordGroup) -> CbfResult<()> {
        for group in [KeywordGroup::FileDescriptor, KeywordGroup::Structural] {
            if group >= from && group < to {
                self.resolver.leave_group(group);
            }
        }
        debug!(?from, ?to, "keyword group transition");

        if to == KeywordGroup::Data {
            self.check_integer_indices()?;
            let counts = self.structure.counts();
            self.resolver.resolve(&counts);
            if simple_bounds_possible(self.resolver.query(), self.resolver.resolved_payload(), &counts)
            {
                self.tracker = Some(SimpleBoundTracker::new());
            }
            debug!(simple_bounds = self.tracker.is_some(), "entered data group");
        }
        Ok(())
    }

    fn payload(&mut self, kw: Keyword) -> Payload {
        let read = self.resolver.wants_payload(kw);
        self.resolver.satisfy(kw);
        if read {
            Payload::Read
        } else if self.resolver.is_exhausted() {
            Payload::Leave
        } else {
            Payload::Skip
        }
    }

    fn read_version<R: Read>(&mut self, reader: &mut LineReader<R>) -> CbfResult<()> {
        let line = reader.expect_raw(Keyword::Ver.name())?;
        let [field] = line.fields::<1>()?;
        let version = field
            .parse::<u32>()
            .map_err(|_| invalid(&line, format!("invalid version '{}'", field)))?;
        Arc::make_mut(&mut self.structure).version = Some(version);
        self.resolver.satisfy(Keyword::Ver);
        Ok(())
    }

    fn read_objective_sense<R: Read>(&mut self, reader: &mut LineReader<R>) -> CbfResult<()> {
        let line = reader.expect_raw(Keyword::ObjSense.name())?;
        let [field] = line.fields::<1>()?;
        let sense = ObjectiveSense::parse(field)
            .ok_or_else(|| invalid(&line, format!("invalid objective sense '{}'", field)))?;
        Arc::make_mut(&mut self.structure).objective_sense = Some(sense);
        self.resolver.satisfy(Keyword::ObjSense);
        Ok(())
    }

    fn read_listed<R, F>(
        &mut self,
        kw: Keyword,
        reader: &mut LineReader<R>,
        parse: F,
    ) -> CbfResult<Listed<usize>>
    where
        R: Read,
        F: Fn(&str, &Line) -> CbfResult<usize>,
    {
        let header = reader.expect_raw(kw.name())?;
        let [field] = header.fields::<1>()?;
        let count = parse_count(field, &header)?;

        let mut list = Listed {
            count,
            items: Vec::new(),
        };
        match self.payload(kw) {
            Payload::Read => {
                list.items.reserve(count.min(MAX_PREALLOCATION));
                for _ in 0..count {
                    let line = reader.expect_raw(kw.name())?;
                    self.clock.tick(line.number)?;
                    let [field] = line.fields::<1>()?;
                    list.items.push(parse(field, &line)?);
                }
            }
            Payload::Skip => reader.skip_raw(count, kw.name())?,
            Payload::Leave => {}
        }
        Ok(list)
    }

    fn read_stacks<R: Read>(&mut self, kw: Keyword, reader: &mut LineReader<R>) -> CbfResult<Stacks> {
        let header = reader.expect_raw(kw.name())?;
        let [total, count] = header.fields::<2>()?;
        let mut stacks = Stacks {
            total: parse_count(total, &header)?,
            count: parse_count(count, &header)?,
            stacks: Vec::new(),
        };

        match self.payload(kw) {
            Payload::Read => {
                stacks.stacks.reserve(stacks.count.min(MAX_PREALLOCATION));
                for _ in 0..stacks.count {
                    let line = reader.expect_raw(kw.name())?;
                    self.clock.tick(line.number)?;
                    let [tag, dim] = line.fields::<2>()?;
                    stacks.stacks.push(Stack {
                        domain: Domain::from_tag(tag),
                        dim: parse_count(dim, &line)?,
                    });
                }
                let sum = stacks
                    .stacks
                    .iter()
                    .try_fold(0usize, |acc, s| acc.checked_add(s.dim));
                if sum != Some(stacks.total) {
                    let found = match sum {
                        Some(sum) => sum.to_string(),
                        None => "more than usize::MAX".to_string(),
                    };
                    return Err(CbfError::inconsistent_header(
                        format!(
                            "{} stack dimensions sum to {}, header declares {}",
                            kw, found, stacks.total
                        ),
                        header.number,
                    )
                    .with_text(header.text.as_str()));
                }
            }
            Payload::Skip => reader.skip_raw(stacks.count, kw.name())?,
            Payload::Leave => {}
        }
        Ok(stacks)
    }

    fn read_coordinates<R: Read>(&mut self, kw: Keyword, reader: &mut LineReader<R>) -> CbfResult<()> {
        let header = reader.expect_raw(kw.name())?;
        let [field] = header.fields::<1>()?;
        let count = parse_count(field, &header)?;
        let payload = self.payload(kw);

        let st = &*self.structure;
        let tracker = &mut self.tracker;
        let clock = &mut self.clock;
        let tables = &mut self.coefficients;
        let mut block = Block {
            kw,
            reader,
            clock,
            count,
            payload,
        };

        match kw {
            Keyword::ObjFCoord => block.read(&mut tables.objective_psd, |line| {
                let [j, k, l, v] = line.fields::<4>()?;
                let psd_var = parse_index(j, "PSD variable", st.psd_variables.count, line)?;
                let (k, l) = matrix_index(k, l, &st.psd_variables, psd_var, line)?;
                Ok(ObjFEntry {
                    psd_var,
                    k,
                    l,
                    value: parse_float(v, line)?,
                })
            }),
            Keyword::ObjACoord => block.read(&mut tables.objective_linear, |line| {
                let [j, v] = line.fields::<2>()?;
                Ok(ObjAEntry {
                    var: parse_index(j, "variable", st.varnum(), line)?,
                    value: parse_float(v, line)?,
                })
            }),
            Keyword::FCoord => block.read(&mut tables.map_psd, |line| {
                let [i, j, k, l, v] = line.fields::<5>()?;
                let row = parse_index(i, "map row", st.mapnum(), line)?;
                let psd_var = parse_index(j, "PSD variable", st.psd_variables.count, line)?;
                let (k, l) = matrix_index(k, l, &st.psd_variables, psd_var, line)?;
                if let Some(t) = tracker.as_mut() {
                    t.record_psd(row);
                }
                Ok(FEntry {
                    row,
                    psd_var,
                    k,
                    l,
                    value: parse_float(v, line)?,
                })
            }),
            Keyword::ACoord => block.read(&mut tables.map_linear, |line| {
                let [i, j, v] = line.fields::<3>()?;
                let row = parse_index(i, "map row", st.mapnum(), line)?;
                let var = parse_index(j, "variable", st.varnum(), line)?;
                let value = parse_float(v, line)?;
                if let Some(t) = tracker.as_mut() {
                    t.record_linear(row, var, value);
                }
                Ok(AEntry { row, var, value })
            }),
            Keyword::BCoord => block.read(&mut tables.map_constant, |line| {
                let [i, v] = line.fields::<2>()?;
                let row = parse_index(i, "map row", st.mapnum(), line)?;
                let value = parse_float(v, line)?;
                if let Some(t) = tracker.as_mut() {
                    t.record_constant(row, value);
                }
                Ok(BEntry { row, value })
            }),
            Keyword::HCoord => block.read(&mut tables.psd_map_linear, |line| {
                let [i, j, k, l, v] = line.fields::<5>()?;
                let psd_map = parse_index(i, "PSD map", st.psd_maps.count, line)?;
                let var = parse_index(j, "variable", st.varnum(), line)?;
                let (k, l) = matrix_index(k, l, &st.psd_maps, psd_map, line)?;
                Ok(HEntry {
                    psd_map,
                    var,
                    k,
                    l,
                    value: parse_float(v, line)?,
                })
            }),
            Keyword::DCoord => block.read(&mut tables.psd_map_constant, |line| {
                let [i, k, l, v] = line.fields::<4>()?;
                let psd_map = parse_index(i, "PSD map", st.psd_maps.count, line)?;
                let (k, l) = matrix_index(k, l, &st.psd_maps, psd_map, line)?;
                Ok(DEntry {
                    psd_map,
                    k,
                    l,
                    value: parse_float(v, line)?,
                })
            }),
            _ => unreachable!("{} is not a coordinate keyword", kw),
        }
    }
}

/// Payload of one coordinate block.
struct Block<'a, R: Read> {
    kw: Keyword,
    reader: &'a mut LineReader<R>,
    clock: &'a mut Clock,
    count: usize,
    payload: Payload,
}

impl<R: Read> Block<'_, R> {
    /// Append the block to `table`, or skip it.
    fn read<E, F>(&mut self, table: &mut Table<E>, mut parse: F) -> CbfResult<()>
    where
        F: FnMut(&Line) -> CbfResult<E>,
    {
        match self.payload {
            Payload::Read => {
                table.entries.reserve(self.count.min(MAX_PREALLOCATION));
                for _ in 0..self.count {
                    let line = self.reader.expect_raw(self.kw.name())?;
                    self.clock.tick(line.number)?;
                    table.entries.push(parse(&line)?);
                }
            }
            Payload::Skip => self.reader.skip_raw(self.count, self.kw.name())?,
            Payload::Leave => {}
        }
        table.nnz += self.count;
        Ok(())
    }
}

fn invalid(line: &Line, message: String) -> CbfError {
    CbfError::invalid_value(message, line.number).with_text(line.text.as_str())
}

fn parse_count(field: &str, line: &Line) -> CbfResult<usize> {
    field
        .parse::<usize>()
        .map_err(|_| invalid(line, format!("expected a non-negative integer, found '{}'", field)))
}

fn parse_float(field: &str, line: &Line) -> CbfResult<f64> {
    field
        .parse::<f64>()
        .map_err(|_| invalid(line, format!("expected a number, found '{}'", field)))
}

fn parse_index(field: &str, what: &str, bound: usize, line: &Line) -> CbfResult<usize> {
    let index = field
        .parse::<i64>()
        .map_err(|_| invalid(line, format!("expected an index, found '{}'", field)))?;
    match usize::try_from(index) {
        Ok(i) if i < bound => Ok(i),
        _ => Err(CbfError::index_out_of_range(what, index, bound, line.number)
            .with_text(line.text.as_str())),
    }
}

/// Parse `(k, l)` of a symmetric matrix entry, checked against the matrix
/// dimension when the dimension list was materialized.
fn matrix_index(
    k: &str,
    l: &str,
    dims: &Listed<usize>,
    which: usize,
    line: &Line,
) -> CbfResult<(usize, usize)> {
    let dim = dims.items.get(which).copied().unwrap_or(usize::MAX);
    Ok((
        parse_index(k, "matrix row", dim, line)?,
        parse_index(l, "matrix column", dim, line)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbf_core::CbfErrorKind;
    use std::io::Cursor;

    fn line(number: usize, text: &str) -> Line {
        Line::new(number, text)
    }

    #[test]
    fn test_parse_index_bounds() {
        let l = line(4, "ACOORD entry");
        assert_eq!(parse_index("2", "variable", 3, &l).unwrap(), 2);

        let err = parse_index("3", "variable", 3, &l).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::IndexOutOfRange);
        assert_eq!(err.line, 4);

        let err = parse_index("-1", "variable", 3, &l).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::IndexOutOfRange);

        let err = parse_index("x", "variable", 3, &l).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::InvalidValue);
    }

    #[test]
    fn test_matrix_index_unknown_dimension() {
        let dims = Listed {
            count: 1,
            items: Vec::new(),
        };
        let l = line(1, "");
        assert_eq!(matrix_index("7", "3", &dims, 0, &l).unwrap(), (7, 3));

        let dims = Listed {
            count: 1,
            items: vec![2],
        };
        let err = matrix_index("2", "0", &dims, 0, &l).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::IndexOutOfRange);
    }

    #[test]
    fn test_state_follows_grammar() {
        let mut reader = LineReader::new(Cursor::new("1\nMIN\n"));
        let mut builder = ProblemBuilder::new("t", KeyQuery::all());
        assert_eq!(builder.state(), ParseState::ExpectVersion);
        builder.accept(&line(1, "VER"), &mut reader).unwrap();
        builder.accept(&line(3, "OBJSENSE"), &mut reader).unwrap();
        assert_eq!(builder.state(), ParseState::ExpectStructural);
    }

    #[test]
    fn test_unrecognized_keyword_carries_text() {
        let mut reader = LineReader::new(Cursor::new(""));
        let mut builder = ProblemBuilder::new("t", KeyQuery::all());
        let err = builder.accept(&line(9, "BOGUS"), &mut reader).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::UnrecognizedKeyword);
        assert_eq!(err.line, 9);
        assert_eq!(err.text.as_deref(), Some("BOGUS"));
    }

    #[test]
    fn test_invalid_objective_sense() {
        let mut reader = LineReader::new(Cursor::new("1\nSIDEWAYS\n"));
        let mut builder = ProblemBuilder::new("t", KeyQuery::all());
        builder.accept(&line(1, "VER"), &mut reader).unwrap();
        let err = builder.accept(&line(3, "OBJSENSE"), &mut reader).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::InvalidValue);
        assert_eq!(err.line, 4);
    }

    #[test]
    fn test_clock_without_limit_never_fails() {
        let mut clock = Clock::new(None);
        for i in 0..1000 {
            clock.tick(i).unwrap();
        }
    }
}
