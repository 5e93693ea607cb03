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

//! Keyword grammar of CBF documents.
//!
//! Keywords fall into three ordered groups. A document starts in the file
//! descriptor group and moves forward whenever it meets a keyword of a later
//! group; it never moves back. The grammar is described by two tables,
//! [`KEYWORDS`] and [`REQUIRED`], and driven by [`GrammarState::accept`].

use crate::error::{CbfError, CbfResult};
use std::fmt;

/// Every keyword of the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Keyword {
    Ver,
    ObjSense,
    PsdVar,
    Var,
    Int,
    PsdCon,
    Con,
    ObjFCoord,
    ObjACoord,
    ObjBCoord,
    FCoord,
    ACoord,
    BCoord,
    HCoord,
    DCoord,
    Change,
}

/// Ordered keyword groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeywordGroup {
    /// `VER`
    FileDescriptor,
    /// `OBJSENSE`, `PSDVAR`, `VAR`, `INT`, `PSDCON`, `CON`
    Structural,
    /// Coefficient keywords and `CHANGE`.
    Data,
}

impl KeywordGroup {
    fn next(self) -> Option<Self> {
        match self {
            Self::FileDescriptor => Some(Self::Structural),
            Self::Structural => Some(Self::Data),
            Self::Data => None,
        }
    }
}

/// Physical layout of the lines that follow a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// A single value line.
    Scalar,
    /// A count line, then `count` records of `fields` fields each.
    Counted { fields: usize },
    /// A `total stack_count` line, then `stack_count` `domain dim` records.
    Stacked,
    /// Nothing follows.
    Marker,
}

/// Keyword table: name, group and payload layout.
pub const KEYWORDS: &[(Keyword, &str, KeywordGroup, Layout)] = &[
    (Keyword::Ver, "VER", KeywordGroup::FileDescriptor, Layout::Scalar),
    (Keyword::ObjSense, "OBJSENSE", KeywordGroup::Structural, Layout::Scalar),
    (Keyword::PsdVar, "PSDVAR", KeywordGroup::Structural, Layout::Counted { fields: 1 }),
    (Keyword::Var, "VAR", KeywordGroup::Structural, Layout::Stacked),
    (Keyword::Int, "INT", KeywordGroup::Structural, Layout::Counted { fields: 1 }),
    (Keyword::PsdCon, "PSDCON", KeywordGroup::Structural, Layout::Counted { fields: 1 }),
    (Keyword::Con, "CON", KeywordGroup::Structural, Layout::Stacked),
    (Keyword::ObjFCoord, "OBJFCOORD", KeywordGroup::Data, Layout::Counted { fields: 4 }),
    (Keyword::ObjACoord, "OBJACOORD", KeywordGroup::Data, Layout::Counted { fields: 2 }),
    (Keyword::ObjBCoord, "OBJBCOORD", KeywordGroup::Data, Layout::Scalar),
    (Keyword::FCoord, "FCOORD", KeywordGroup::Data, Layout::Counted { fields: 5 }),
    (Keyword::ACoord, "ACOORD", KeywordGroup::Data, Layout::Counted { fields: 3 }),
    (Keyword::BCoord, "BCOORD", KeywordGroup::Data, Layout::Counted { fields: 2 }),
    (Keyword::HCoord, "HCOORD", KeywordGroup::Data, Layout::Counted { fields: 5 }),
    (Keyword::DCoord, "DCOORD", KeywordGroup::Data, Layout::Counted { fields: 4 }),
    (Keyword::Change, "CHANGE", KeywordGroup::Data, Layout::Marker),
];

/// Keywords a group must contain before the document may leave it.
pub const REQUIRED: &[(KeywordGroup, Keyword)] = &[
    (KeywordGroup::FileDescriptor, Keyword::Ver),
    (KeywordGroup::Structural, Keyword::ObjSense),
];

impl Keyword {
    /// All keywords in table order.
    pub fn all() -> impl Iterator<Item = Keyword> {
        KEYWORDS.iter().map(|(kw, ..)| *kw)
    }

    fn entry(self) -> &'static (Keyword, &'static str, KeywordGroup, Layout) {
        // The table lists keywords in declaration order.
        &KEYWORDS[self as usize]
    }

    /// Keyword as written in CBF files.
    pub fn name(self) -> &'static str {
        self.entry().1
    }

    /// Group the keyword belongs to.
    pub fn group(self) -> KeywordGroup {
        self.entry().2
    }

    /// Layout of the keyword's payload.
    pub fn layout(self) -> Layout {
        self.entry().3
    }

    /// Look up a keyword by its exact name.
    pub fn parse(name: &str) -> Option<Keyword> {
        KEYWORDS
            .iter()
            .find(|(_, n, ..)| *n == name)
            .map(|(kw, ..)| *kw)
    }

    /// Keywords whose count may gate a conditional query key.
    pub fn is_structural_count(self) -> bool {
        matches!(
            self,
            Keyword::PsdVar | Keyword::PsdCon | Keyword::Int | Keyword::Var | Keyword::Con
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compact set of keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeywordSet(u32);

impl KeywordSet {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Every keyword of one group.
    pub fn group(group: KeywordGroup) -> Self {
        Keyword::all().filter(|kw| kw.group() == group).collect()
    }

    /// Every keyword.
    pub fn all() -> Self {
        Keyword::all().collect()
    }

    #[inline]
    pub fn contains(&self, kw: Keyword) -> bool {
        self.0 & (1 << kw as u32) != 0
    }

    /// Insert a keyword, returning `false` if it was already present.
    #[inline]
    pub fn insert(&mut self, kw: Keyword) -> bool {
        let had = self.contains(kw);
        self.0 |= 1 << kw as u32;
        !had
    }

    #[inline]
    pub fn remove(&mut self, kw: Keyword) -> bool {
        let had = self.contains(kw);
        self.0 &= !(1 << kw as u32);
        had
    }

    /// Remove every keyword of `other`.
    pub fn subtract(&mut self, other: KeywordSet) {
        self.0 &= !other.0;
    }

    pub fn intersection(&self, other: KeywordSet) -> KeywordSet {
        KeywordSet(self.0 & other.0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Keyword> + '_ {
        Keyword::all().filter(move |kw| self.contains(*kw))
    }
}

impl FromIterator<Keyword> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = Keyword>>(iter: I) -> Self {
        let mut set = KeywordSet::new();
        for kw in iter {
            set.insert(kw);
        }
        set
    }
}

/// What accepting a keyword did to the grammar state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keyword belongs to the current group.
    Within,
    /// The document moved forward; `from` was the group being left.
    Advanced { from: KeywordGroup, to: KeywordGroup },
    /// A `CHANGE` marker closed the current data pass.
    Change,
}

/// Position of a document in the keyword grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarState {
    group: KeywordGroup,
    seen: KeywordSet,
    changes: usize,
}

impl Default for GrammarState {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarState {
    pub fn new() -> Self {
        Self {
            group: KeywordGroup::FileDescriptor,
            seen: KeywordSet::new(),
            changes: 0,
        }
    }

    /// Current group.
    pub fn group(&self) -> KeywordGroup {
        self.group
    }

    /// Keywords seen so far in the current pass.
    pub fn seen(&self) -> KeywordSet {
        self.seen
    }

    /// Number of `CHANGE` markers accepted.
    pub fn changes(&self) -> usize {
        self.changes
    }

    fn check_required(&self, group: KeywordGroup) -> CbfResult<()> {
        for (g, kw) in REQUIRED {
            if *g == group && !self.seen.contains(*kw) {
                return Err(CbfError::missing_keyword(kw, 0));
            }
        }
        Ok(())
    }

    /// Feed the next keyword. Errors carry no line; callers attach it.
    pub fn accept(&mut self, kw: Keyword) -> CbfResult<Step> {
        let target = kw.group();
        if target < self.group {
            return Err(CbfError::misplaced_keyword(kw, 0));
        }

        let from = self.group;
        while self.group < target {
            self.check_required(self.group)?;
            // Loop condition guarantees a later group exists.
            self.group = self.group.next().unwrap_or(KeywordGroup::Data);
        }

        if kw == Keyword::Change {
            self.seen.subtract(KeywordSet::group(KeywordGroup::Data));
            self.changes += 1;
            return Ok(Step::Change);
        }

        if !self.seen.insert(kw) {
            return Err(CbfError::duplicate_keyword(kw, 0));
        }

        if from == target {
            Ok(Step::Within)
        } else {
            Ok(Step::Advanced { from, to: target })
        }
    }

    /// Check the end of the document: every group from the current one on
    /// must have its required keywords.
    pub fn finish(&self) -> CbfResult<()> {
        let mut group = Some(self.group);
        while let Some(g) = group {
            self.check_required(g)?;
            group = g.next();
        }
        Ok(())
    }
}
