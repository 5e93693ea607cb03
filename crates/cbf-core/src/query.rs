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

//! Partial-parsing queries.
//!
//! A query names the keywords a caller is interested in. Each key is one of
//!
//! - `KW`: parse the block and keep its payload,
//! - `KW:HEAD`: parse only the block's count header,
//! - `D1=>D2=>...=>KEY`: request `KEY` only if the structural counts of
//!   `D1`, `D2`, ... all turn out nonzero,
//! - `*`: the sentinel; parse the whole document and never stop early.
//!
//! Resolution happens in two phases. The symbolic [`KeyQuery`] is what the
//! caller builds. [`QueryResolver::resolve`] is invoked once, when the
//! document leaves the structural group and every count is known, and turns
//! conditional keys into concrete data-group requests.

use crate::error::{CbfError, CbfResult};
use crate::keyword::{Keyword, KeywordGroup, KeywordSet};
use std::fmt;
use tracing::debug;

/// Separator of conditional keys.
pub const DEPENDENCY_SEPARATOR: &str = "=>";
/// Suffix of header-only keys.
pub const HEAD_SUFFIX: &str = ":HEAD";
/// Spelling of the sentinel key.
pub const SENTINEL: &str = "*";
/// Alternative spelling of the sentinel key.
pub const SENTINEL_ALIAS: &str = "None";

/// What a key asks of its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Demand {
    /// Materialize the payload.
    Payload,
    /// Read the count header, skip the payload.
    Head,
}

/// One key of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Structural keywords whose counts must all be nonzero.
    pub depends_on: Vec<Keyword>,
    pub keyword: Keyword,
    pub demand: Demand,
}

impl QueryKey {
    pub fn payload(keyword: Keyword) -> Self {
        Self {
            depends_on: Vec::new(),
            keyword,
            demand: Demand::Payload,
        }
    }

    pub fn head(keyword: Keyword) -> Self {
        Self {
            depends_on: Vec::new(),
            keyword,
            demand: Demand::Head,
        }
    }

    /// Make the key conditional on a structural count.
    pub fn when(mut self, dependency: Keyword) -> CbfResult<Self> {
        if !dependency.is_structural_count() {
            return Err(CbfError::malformed_dependency(dependency.name()));
        }
        self.depends_on.push(dependency);
        Ok(self)
    }

    /// Parse `KW`, `KW:HEAD` or `D1=>...=>KEY`.
    pub fn parse(text: &str) -> CbfResult<Self> {
        let mut parts: Vec<&str> = text.split(DEPENDENCY_SEPARATOR).map(str::trim).collect();
        // split always yields at least one element
        let last = parts.pop().unwrap_or_default();

        let (name, demand) = match last.strip_suffix(HEAD_SUFFIX) {
            Some(name) => (name, Demand::Head),
            None => (last, Demand::Payload),
        };
        let keyword =
            Keyword::parse(name).ok_or_else(|| CbfError::unrecognized_keyword(name, 0))?;

        let mut key = Self {
            depends_on: Vec::with_capacity(parts.len()),
            keyword,
            demand,
        };
        for dep in parts {
            match Keyword::parse(dep) {
                Some(kw) if kw.is_structural_count() => key.depends_on.push(kw),
                _ => return Err(CbfError::malformed_dependency(dep)),
            }
        }
        Ok(key)
    }

    pub fn is_conditional(&self) -> bool {
        !self.depends_on.is_empty()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dep in &self.depends_on {
            write!(f, "{}{}", dep, DEPENDENCY_SEPARATOR)?;
        }
        write!(f, "{}", self.keyword)?;
        if self.demand == Demand::Head {
            f.write_str(HEAD_SUFFIX)?;
        }
        Ok(())
    }
}

/// Structural counts discovered while parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructuralCounts {
    pub psdvar: usize,
    pub psdcon: usize,
    pub int: usize,
    pub var: usize,
    pub con: usize,
}

impl StructuralCounts {
    /// Count behind a structural keyword; `None` for other keywords.
    pub fn of(&self, kw: Keyword) -> Option<usize> {
        match kw {
            Keyword::PsdVar => Some(self.psdvar),
            Keyword::PsdCon => Some(self.psdcon),
            Keyword::Int => Some(self.int),
            Keyword::Var => Some(self.var),
            Keyword::Con => Some(self.con),
            _ => None,
        }
    }
}

/// Symbolic query: the caller's key set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyQuery {
    keys: Vec<QueryKey>,
    exhaustive: bool,
}

impl KeyQuery {
    /// Empty query. Parsing stops as soon as the version is known.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every keyword with payload, plus the sentinel.
    pub fn all() -> Self {
        Self {
            keys: Keyword::all().map(QueryKey::payload).collect(),
            exhaustive: true,
        }
    }

    /// Parse a list of textual keys; `*` (or `None`) is the sentinel.
    pub fn parse<'a, I>(keys: I) -> CbfResult<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut query = Self::new();
        for key in keys {
            let key = key.trim();
            if key == SENTINEL || key == SENTINEL_ALIAS {
                query.exhaustive = true;
            } else {
                query.keys.push(QueryKey::parse(key)?);
            }
        }
        Ok(query)
    }

    pub fn with(mut self, key: QueryKey) -> Self {
        self.keys.push(key);
        self
    }

    /// Add the sentinel: never stop early.
    pub fn exhaustive(mut self) -> Self {
        self.exhaustive = true;
        self
    }

    pub fn is_exhaustive(&self) -> bool {
        self.exhaustive
    }

    pub fn keys(&self) -> &[QueryKey] {
        &self.keys
    }

    /// Whether the payload of `kw` is requested without conditions.
    pub fn requests_payload(&self, kw: Keyword) -> bool {
        self.keys
            .iter()
            .any(|k| !k.is_conditional() && k.keyword == kw && k.demand == Demand::Payload)
    }

    /// Unconditional keys, split into payload and header-only sets.
    fn unconditional(&self) -> (KeywordSet, KeywordSet) {
        let mut payload = KeywordSet::new();
        let mut head = KeywordSet::new();
        for key in self.keys.iter().filter(|k| !k.is_conditional()) {
            match key.demand {
                Demand::Payload => payload.insert(key.keyword),
                Demand::Head => head.insert(key.keyword),
            };
        }
        (payload, head)
    }

    /// Phase two: concrete key sets given the structural counts.
    fn resolve(&self, counts: &StructuralCounts) -> (KeywordSet, KeywordSet) {
        let mut payload = KeywordSet::new();
        let mut head = KeywordSet::new();
        for key in &self.keys {
            let active = key
                .depends_on
                .iter()
                .all(|dep| counts.of(*dep).unwrap_or(0) > 0);
            if active {
                match key.demand {
                    Demand::Payload => payload.insert(key.keyword),
                    Demand::Head => head.insert(key.keyword),
                };
            }
        }
        (payload, head)
    }
}

/// Tracks which requested keys are still outstanding during a parse.
#[derive(Debug, Clone)]
pub struct QueryResolver {
    query: KeyQuery,
    payload: KeywordSet,
    head: KeywordSet,
    /// Conditional keys not yet resolved.
    pending: bool,
    /// Data-group keys after resolution, restored on every `CHANGE`.
    resolved: Option<(KeywordSet, KeywordSet)>,
}

impl QueryResolver {
    pub fn new(query: KeyQuery) -> Self {
        let (payload, head) = query.unconditional();
        let pending = query.keys.iter().any(QueryKey::is_conditional);
        Self {
            query,
            payload,
            head,
            pending,
            resolved: None,
        }
    }

    /// The caller's symbolic query.
    pub fn query(&self) -> &KeyQuery {
        &self.query
    }

    /// Whether the payload of `kw` should be materialized.
    #[inline]
    pub fn wants_payload(&self, kw: Keyword) -> bool {
        self.payload.contains(kw)
    }

    /// Whether `kw` is requested at all.
    #[inline]
    pub fn wants(&self, kw: Keyword) -> bool {
        self.payload.contains(kw) || self.head.contains(kw)
    }

    /// Mark a keyword as handled.
    pub fn satisfy(&mut self, kw: Keyword) {
        self.payload.remove(kw);
        self.head.remove(kw);
    }

    /// Drop any request for keywords of a group the document has left.
    pub fn leave_group(&mut self, group: KeywordGroup) {
        let keys = KeywordSet::group(group);
        self.payload.subtract(keys);
        self.head.subtract(keys);
    }

    /// Resolve conditional keys against the structural counts. Invoked once,
    /// when the document enters the data group.
    pub fn resolve(&mut self, counts: &StructuralCounts) {
        let data = KeywordSet::group(KeywordGroup::Data);
        let (payload, head) = self.query.resolve(counts);
        let resolved = (payload.intersection(data), head.intersection(data));
        debug!(
            payload = resolved.0.len(),
            head = resolved.1.len(),
            "resolved data-group query"
        );
        self.payload = resolved.0;
        self.head = resolved.1;
        self.pending = false;
        self.resolved = Some(resolved);
    }

    /// Whether the resolution step already ran.
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Data-group keys whose payload was resolved as requested.
    pub fn resolved_payload(&self) -> KeywordSet {
        self.resolved.map(|(p, _)| p).unwrap_or_default()
    }

    /// Start a new data pass after `CHANGE`.
    pub fn restart_pass(&mut self) {
        if let Some((payload, head)) = self.resolved {
            self.payload = payload;
            self.head = head;
        }
    }

    /// Nothing left to read: parsing may stop.
    pub fn is_exhausted(&self) -> bool {
        !self.query.exhaustive && !self.pending && self.payload.is_empty() && self.head.is_empty()
    }
}
