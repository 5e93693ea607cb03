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

//! In-memory problem model.
//!
//! A [`ProblemModel`] is one snapshot of a document. The structural part
//! (objective sense, stacks, integer indices, PSD dimensions) is fixed for
//! the whole document and shared between snapshots; the coefficient tables
//! grow with every `CHANGE` pass.

use crate::domain::Domain;
use crate::query::StructuralCounts;
use std::fmt;
use std::sync::Arc;

/// Direction of optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

impl ObjectiveSense {
    /// Parse `MIN` or `MAX`, ignoring case.
    pub fn parse(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("MIN") {
            Some(Self::Minimize)
        } else if text.eq_ignore_ascii_case("MAX") {
            Some(Self::Maximize)
        } else {
            None
        }
    }

    pub fn is_minimize(self) -> bool {
        self == Self::Minimize
    }
}

impl fmt::Display for ObjectiveSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimize => f.write_str("MIN"),
            Self::Maximize => f.write_str("MAX"),
        }
    }
}

/// Consecutive scalars sharing one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stack {
    pub domain: Domain,
    pub dim: usize,
}

/// Stack list of the `VAR` or `CON` block.
///
/// `total` and `count` come from the block header and are always known once
/// the keyword was seen; `stacks` is empty unless the payload was requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stacks {
    /// Number of scalars.
    pub total: usize,
    /// Number of stacks.
    pub count: usize,
    pub stacks: Vec<Stack>,
}

impl Stacks {
    pub fn is_materialized(&self) -> bool {
        self.stacks.len() == self.count
    }

    /// Iterate scalars as `(domain, position within its stack)`.
    pub fn scalars(&self) -> impl Iterator<Item = (&Domain, usize)> + '_ {
        self.stacks
            .iter()
            .flat_map(|s| (0..s.dim).map(move |k| (&s.domain, k)))
    }

    /// Iterate stacks together with the index of their first scalar.
    pub fn with_offsets(&self) -> impl Iterator<Item = (usize, &Stack)> + '_ {
        self.stacks.iter().scan(0usize, |offset, s| {
            let start = *offset;
            *offset += s.dim;
            Some((start, s))
        })
    }
}

/// A counted list (`INT`, `PSDVAR`, `PSDCON`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Listed<T> {
    /// Count from the header.
    pub count: usize,
    /// Items, empty unless the payload was requested.
    pub items: Vec<T>,
}

impl<T> Default for Listed<T> {
    fn default() -> Self {
        Self {
            count: 0,
            items: Vec::new(),
        }
    }
}

impl<T> Listed<T> {
    pub fn is_materialized(&self) -> bool {
        self.items.len() == self.count
    }
}

/// Structural part of a document, fixed across `CHANGE` snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Structure {
    /// Format version (`VER`).
    pub version: Option<u32>,
    pub objective_sense: Option<ObjectiveSense>,
    /// Scalar variables (`VAR`).
    pub variables: Stacks,
    /// Indices of integer variables (`INT`).
    pub integer_variables: Listed<usize>,
    /// Dimensions of semidefinite variables (`PSDVAR`).
    pub psd_variables: Listed<usize>,
    /// Scalar affine map rows (`CON`).
    pub maps: Stacks,
    /// Dimensions of semidefinite affine maps (`PSDCON`).
    pub psd_maps: Listed<usize>,
}

impl Structure {
    pub fn varnum(&self) -> usize {
        self.variables.total
    }

    pub fn mapnum(&self) -> usize {
        self.maps.total
    }

    pub fn counts(&self) -> StructuralCounts {
        StructuralCounts {
            psdvar: self.psd_variables.count,
            psdcon: self.psd_maps.count,
            int: self.integer_variables.count,
            var: self.variables.total,
            con: self.maps.total,
        }
    }
}

/// Sparse coefficient table.
///
/// `nnz` is the number of entries the document declared so far; `entries`
/// holds them only when the payload was requested.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Table<E> {
    pub nnz: usize,
    pub entries: Vec<E>,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            nnz: 0,
            entries: Vec::new(),
        }
    }
}

impl<E> Table<E> {
    pub fn is_empty(&self) -> bool {
        self.nnz == 0
    }
}

/// `OBJFCOORD j k l v`: objective coefficient of PSD variable `j` at `(k, l)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjFEntry {
    pub psd_var: usize,
    pub k: usize,
    pub l: usize,
    pub value: f64,
}

/// `OBJACOORD j v`: objective coefficient of scalar variable `j`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjAEntry {
    pub var: usize,
    pub value: f64,
}

/// `FCOORD i j k l v`: map row `i`, PSD variable `j` at `(k, l)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FEntry {
    pub row: usize,
    pub psd_var: usize,
    pub k: usize,
    pub l: usize,
    pub value: f64,
}

/// `ACOORD i j v`: map row `i`, scalar variable `j`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AEntry {
    pub row: usize,
    pub var: usize,
    pub value: f64,
}

/// `BCOORD i v`: constant of map row `i`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BEntry {
    pub row: usize,
    pub value: f64,
}

/// `HCOORD i j k l v`: PSD map `i`, scalar variable `j`, at `(k, l)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HEntry {
    pub psd_map: usize,
    pub var: usize,
    pub k: usize,
    pub l: usize,
    pub value: f64,
}

/// `DCOORD i k l v`: constant of PSD map `i` at `(k, l)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DEntry {
    pub psd_map: usize,
    pub k: usize,
    pub l: usize,
    pub value: f64,
}

/// Every coefficient table of a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coefficients {
    pub objective_psd: Table<ObjFEntry>,
    pub objective_linear: Table<ObjAEntry>,
    pub objective_constant: f64,
    pub map_psd: Table<FEntry>,
    pub map_linear: Table<AEntry>,
    pub map_constant: Table<BEntry>,
    pub psd_map_linear: Table<HEntry>,
    pub psd_map_constant: Table<DEntry>,
}

/// Simple lower and upper bounds of the scalar variables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl VariableBounds {
    /// Unbounded in both directions.
    pub fn free(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    pub fn tighten_lower(&mut self, j: usize, value: f64) {
        self.lower[j] = self.lower[j].max(value);
    }

    pub fn tighten_upper(&mut self, j: usize, value: f64) {
        self.upper[j] = self.upper[j].min(value);
    }
}

/// One snapshot of a CBF document.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProblemModel {
    /// Instance name derived from the file name.
    pub name: String,
    /// Position of the snapshot in the `CHANGE` sequence, starting at 0.
    pub snapshot: usize,
    pub structure: Arc<Structure>,
    pub coefficients: Coefficients,
    /// Whether a `CHANGE` marker ended this snapshot.
    pub has_change_marker: bool,
    /// Derived simple bounds, present when derivable.
    pub bounds: Option<VariableBounds>,
}

impl ProblemModel {
    pub fn version(&self) -> Option<u32> {
        self.structure.version
    }

    pub fn objective_sense(&self) -> Option<ObjectiveSense> {
        self.structure.objective_sense
    }

    pub fn varnum(&self) -> usize {
        self.structure.varnum()
    }

    pub fn mapnum(&self) -> usize {
        self.structure.mapnum()
    }

    pub fn variables(&self) -> &Stacks {
        &self.structure.variables
    }

    pub fn maps(&self) -> &Stacks {
        &self.structure.maps
    }

    pub fn integer_variables(&self) -> &[usize] {
        &self.structure.integer_variables.items
    }

    pub fn simple_bounds_available(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn lower_bounds(&self) -> Option<&[f64]> {
        self.bounds.as_ref().map(|b| b.lower.as_slice())
    }

    pub fn upper_bounds(&self) -> Option<&[f64]> {
        self.bounds.as_ref().map(|b| b.upper.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacks(layout: &[(Domain, usize)]) -> Stacks {
        Stacks {
            total: layout.iter().map(|(_, d)| d).sum(),
            count: layout.len(),
            stacks: layout
                .iter()
                .map(|(domain, dim)| Stack {
                    domain: domain.clone(),
                    dim: *dim,
                })
                .collect(),
        }
    }

    #[test]
    fn test_objective_sense_parse() {
        assert_eq!(ObjectiveSense::parse("MIN"), Some(ObjectiveSense::Minimize));
        assert_eq!(ObjectiveSense::parse("max"), Some(ObjectiveSense::Maximize));
        assert_eq!(ObjectiveSense::parse("MINIMIZE"), None);
        assert_eq!(ObjectiveSense::Maximize.to_string(), "MAX");
    }

    #[test]
    fn test_stack_scalars_and_offsets() {
        let s = stacks(&[(Domain::Free, 2), (Domain::Quadratic, 3)]);
        let scalars: Vec<_> = s.scalars().map(|(d, k)| (d.tag().to_string(), k)).collect();
        assert_eq!(
            scalars,
            vec![
                ("F".to_string(), 0),
                ("F".to_string(), 1),
                ("Q".to_string(), 0),
                ("Q".to_string(), 1),
                ("Q".to_string(), 2),
            ]
        );
        let offsets: Vec<_> = s.with_offsets().map(|(o, st)| (o, st.dim)).collect();
        assert_eq!(offsets, vec![(0, 2), (2, 3)]);
        assert!(s.is_materialized());
    }

    #[test]
    fn test_header_only_stacks_are_not_materialized() {
        let s = Stacks {
            total: 10,
            count: 2,
            stacks: Vec::new(),
        };
        assert!(!s.is_materialized());
        assert!(Stacks::default().is_materialized());
    }

    #[test]
    fn test_counts() {
        let st = Structure {
            variables: stacks(&[(Domain::Free, 4)]),
            maps: stacks(&[(Domain::NonNeg, 2)]),
            integer_variables: Listed {
                count: 1,
                items: vec![0],
            },
            ..Default::default()
        };
        let c = st.counts();
        assert_eq!((c.var, c.con, c.int, c.psdvar, c.psdcon), (4, 2, 1, 0, 0));
    }

    #[test]
    fn test_bounds_tightening() {
        let mut b = VariableBounds::free(2);
        b.tighten_lower(0, 1.0);
        b.tighten_lower(0, -5.0);
        b.tighten_upper(1, 3.0);
        b.tighten_upper(1, 7.0);
        assert_eq!(b.lower, vec![1.0, f64::NEG_INFINITY]);
        assert_eq!(b.upper, vec![f64::INFINITY, 3.0]);
    }
}
