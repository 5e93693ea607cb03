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

//! Simple-bound derivation.
//!
//! A map row whose only linear term is `±1·x_j` (no PSD term) and whose
//! domain constrains it in sign is a bound on `x_j`. The tracker records the
//! shape of every row while the coefficient tables stream by; [`derive`]
//! folds the rows into per-variable bounds on top of the variable domains.
//!
//! [`derive`]: SimpleBoundTracker::derive

use crate::keyword::{Keyword, KeywordSet};
use crate::model::{Structure, VariableBounds};
use crate::query::{KeyQuery, StructuralCounts};

/// Shape of a map row as far as bound derivation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowShape {
    /// No linear term seen yet.
    Unassigned,
    /// Exactly one unit term on this variable.
    Variable(usize),
    /// Anything else.
    NotSimple,
}

/// Whether bounds can be derived for a query.
///
/// The variable and map stacks must be materialized, and every table that
/// could affect a row (`BCOORD`, plus `ACOORD` and `FCOORD` when there are
/// scalar or PSD variables) must be read.
pub fn simple_bounds_possible(
    query: &KeyQuery,
    resolved: KeywordSet,
    counts: &StructuralCounts,
) -> bool {
    query.requests_payload(Keyword::Var)
        && query.requests_payload(Keyword::Con)
        && (counts.con == 0 || resolved.contains(Keyword::BCoord))
        && (counts.con == 0 || counts.var == 0 || resolved.contains(Keyword::ACoord))
        && (counts.con == 0 || counts.psdvar == 0 || resolved.contains(Keyword::FCoord))
}

/// Per-row scratch state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Row {
    shape: RowShape,
    sign: f64,
    constant: f64,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            shape: RowShape::Unassigned,
            sign: 0.0,
            constant: 0.0,
        }
    }
}

/// Scratch state collected while coefficient entries stream by.
///
/// Rows are stored up to the highest row recorded, so memory follows the
/// entries actually read rather than the declared map count.
#[derive(Debug, Clone, Default)]
pub struct SimpleBoundTracker {
    rows: Vec<Row>,
}

impl SimpleBoundTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn row_mut(&mut self, row: usize) -> &mut Row {
        if row >= self.rows.len() {
            self.rows.resize(row + 1, Row::default());
        }
        &mut self.rows[row]
    }

    /// Record `ACOORD row var value`.
    pub fn record_linear(&mut self, row: usize, var: usize, value: f64) {
        let r = self.row_mut(row);
        r.shape = match r.shape {
            RowShape::Unassigned if value.abs() == 1.0 => {
                r.sign = value;
                RowShape::Variable(var)
            }
            _ => RowShape::NotSimple,
        };
    }

    /// Record an `FCOORD` entry on `row`.
    pub fn record_psd(&mut self, row: usize) {
        self.row_mut(row).shape = RowShape::NotSimple;
    }

    /// Record `BCOORD row value`. Repeated entries on a row add up.
    pub fn record_constant(&mut self, row: usize, value: f64) {
        self.row_mut(row).constant += value;
    }

    /// Variable bounds implied by the domains and the simple rows.
    pub fn derive(&self, structure: &Structure) -> VariableBounds {
        let mut bounds = VariableBounds::free(structure.varnum());

        for (j, (domain, k)) in structure.variables.scalars().enumerate() {
            if domain.bounds_below(k) {
                bounds.tighten_lower(j, 0.0);
            }
            if domain.bounds_above() {
                bounds.tighten_upper(j, 0.0);
            }
        }

        for ((domain, k), row) in structure.maps.scalars().zip(&self.rows) {
            let RowShape::Variable(j) = row.shape else {
                continue;
            };
            let sign = row.sign;
            let b = -row.constant * sign;
            if domain.bounds_below(k) {
                if sign > 0.0 {
                    bounds.tighten_lower(j, b);
                } else {
                    bounds.tighten_upper(j, b);
                }
            }
            if domain.bounds_above() {
                if sign > 0.0 {
                    bounds.tighten_upper(j, b);
                } else {
                    bounds.tighten_lower(j, b);
                }
            }
        }

        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::model::{Stack, Stacks};

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

    fn structure(vars: &[(Domain, usize)], maps: &[(Domain, usize)]) -> Structure {
        Structure {
            variables: stacks(vars),
            maps: stacks(maps),
            ..Default::default()
        }
    }

    // ==================== Domain bounds ====================

    #[test]
    fn test_domain_bounds_only() {
        let st = structure(
            &[
                (Domain::Free, 1),
                (Domain::NonNeg, 1),
                (Domain::NonPos, 1),
                (Domain::Zero, 1),
                (Domain::Quadratic, 3),
            ],
            &[],
        );
        let b = SimpleBoundTracker::new().derive(&st);
        let inf = f64::INFINITY;
        assert_eq!(b.lower, vec![-inf, 0.0, -inf, 0.0, 0.0, 0.0, -inf]);
        assert_eq!(b.upper, vec![inf, inf, 0.0, 0.0, inf, inf, inf]);
    }

    #[test]
    fn test_rotated_cone_prefix() {
        let st = structure(&[(Domain::RotatedQuadratic, 4)], &[]);
        let b = SimpleBoundTracker::new().derive(&st);
        assert_eq!(&b.lower[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(b.lower[3], f64::NEG_INFINITY);
    }

    // ==================== Row bounds ====================

    #[test]
    fn test_upper_bound_from_negated_row() {
        // -x0 + 5 >= 0
        let st = structure(&[(Domain::Free, 1)], &[(Domain::NonNeg, 1)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(0, 0, -1.0);
        t.record_constant(0, 5.0);
        let b = t.derive(&st);
        assert_eq!(b.upper, vec![5.0]);
        assert_eq!(b.lower, vec![f64::NEG_INFINITY]);
    }

    #[test]
    fn test_lower_bound_from_nonpos_row() {
        // -x0 + 2 <= 0  =>  x0 >= 2
        let st = structure(&[(Domain::Free, 1)], &[(Domain::NonPos, 1)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(0, 0, -1.0);
        t.record_constant(0, 2.0);
        let b = t.derive(&st);
        assert_eq!(b.lower, vec![2.0]);
        assert_eq!(b.upper, vec![f64::INFINITY]);
    }

    #[test]
    fn test_equality_row_fixes_variable() {
        let st = structure(&[(Domain::Free, 1)], &[(Domain::Zero, 1)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(0, 0, 1.0);
        t.record_constant(0, -3.0);
        let b = t.derive(&st);
        assert_eq!(b.lower, vec![3.0]);
        assert_eq!(b.upper, vec![3.0]);
    }

    #[test]
    fn test_bounds_only_tighten() {
        let st = structure(&[(Domain::NonNeg, 1)], &[(Domain::NonNeg, 1)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(0, 0, 1.0);
        t.record_constant(0, 4.0);
        let b = t.derive(&st);
        // x0 >= -4 is looser than x0 >= 0
        assert_eq!(b.lower, vec![0.0]);
    }

    #[test]
    fn test_constants_add_up() {
        let st = structure(&[(Domain::Free, 1)], &[(Domain::NonNeg, 1)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(0, 0, 1.0);
        t.record_constant(0, -1.0);
        t.record_constant(0, -2.0);
        assert_eq!(t.derive(&st).lower, vec![3.0]);
    }

    // ==================== Non-simple rows ====================

    #[test]
    fn test_non_unit_coefficient() {
        let st = structure(&[(Domain::Free, 1)], &[(Domain::NonNeg, 1)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(0, 0, 2.0);
        t.record_constant(0, 5.0);
        let b = t.derive(&st);
        assert_eq!(b.lower, vec![f64::NEG_INFINITY]);
        assert_eq!(b.upper, vec![f64::INFINITY]);
    }

    #[test]
    fn test_second_term_disqualifies() {
        let st = structure(&[(Domain::Free, 2)], &[(Domain::NonNeg, 1)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(0, 0, 1.0);
        t.record_linear(0, 1, 1.0);
        let b = t.derive(&st);
        assert!(b.lower.iter().all(|v| *v == f64::NEG_INFINITY));
    }

    #[test]
    fn test_psd_term_disqualifies() {
        let st = structure(&[(Domain::Free, 1)], &[(Domain::NonNeg, 1)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(0, 0, 1.0);
        t.record_psd(0);
        assert_eq!(t.derive(&st).lower, vec![f64::NEG_INFINITY]);
    }

    #[test]
    fn test_free_row_gives_nothing() {
        let st = structure(&[(Domain::Free, 1)], &[(Domain::Free, 1)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(0, 0, 1.0);
        t.record_constant(0, 1.0);
        let b = t.derive(&st);
        assert_eq!(b.lower, vec![f64::NEG_INFINITY]);
        assert_eq!(b.upper, vec![f64::INFINITY]);
    }

    #[test]
    fn test_rows_grow_on_demand() {
        // Only row 2 of three carries an entry.
        let st = structure(&[(Domain::Free, 2)], &[(Domain::NonNeg, 3)]);
        let mut t = SimpleBoundTracker::new();
        t.record_linear(2, 1, 1.0);
        t.record_constant(2, -7.0);
        let b = t.derive(&st);
        assert_eq!(b.lower, vec![f64::NEG_INFINITY, 7.0]);
        assert_eq!(b.upper, vec![f64::INFINITY; 2]);
    }

    // ==================== Preconditions ====================

    #[test]
    fn test_precondition() {
        let counts = StructuralCounts {
            var: 2,
            con: 1,
            ..Default::default()
        };
        let query = KeyQuery::parse(["VAR", "CON", "ACOORD", "BCOORD"]).unwrap();
        let resolved: KeywordSet = [Keyword::ACoord, Keyword::BCoord].into_iter().collect();
        assert!(simple_bounds_possible(&query, resolved, &counts));

        let resolved: KeywordSet = [Keyword::ACoord].into_iter().collect();
        assert!(!simple_bounds_possible(&query, resolved, &counts));

        let query = KeyQuery::parse(["CON", "ACOORD", "BCOORD"]).unwrap();
        assert!(!simple_bounds_possible(&query, KeywordSet::all(), &counts));
    }

    #[test]
    fn test_precondition_without_maps() {
        let counts = StructuralCounts {
            var: 3,
            ..Default::default()
        };
        let query = KeyQuery::parse(["VAR", "CON"]).unwrap();
        assert!(simple_bounds_possible(&query, KeywordSet::new(), &counts));
    }

    #[test]
    fn test_precondition_needs_fcoord_with_psd_variables() {
        let counts = StructuralCounts {
            var: 1,
            con: 1,
            psdvar: 1,
            ..Default::default()
        };
        let query = KeyQuery::all();
        let resolved: KeywordSet = [Keyword::ACoord, Keyword::BCoord].into_iter().collect();
        assert!(!simple_bounds_possible(&query, resolved, &counts));
        let resolved: KeywordSet = [Keyword::ACoord, Keyword::BCoord, Keyword::FCoord]
            .into_iter()
            .collect();
        assert!(simple_bounds_possible(&query, resolved, &counts));
    }
}
