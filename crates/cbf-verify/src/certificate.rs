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

//! Solution certificates and objective status classification.
//!
//! A primal point `x` is checked against the variable cones and the map
//! cones (`A x + b` for a solution, `A x` for an improving ray). A dual
//! point `y` is checked against the dual map cones and the dual variable
//! cones (`Aᵀ y - c` for a solution, `Aᵀ y` for a ray), oriented by the
//! objective sense. Dual tags carry a `*` suffix. PSD blocks are not
//! checked.
//!
//! [`assess`] combines both certificates into an [`Assessment`] of what a
//! solver run established about the objective.

use crate::cones::{ConeRegistry, INTEGER_TAG};
use crate::error::{VerifyError, VerifyResult};
use crate::format::format_e4;
use crate::solution::{Claim, Solution};
use cbf_core::{CbfError, ProblemModel, Stacks};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Largest acceptable cone distance for a point to count as feasible.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-4;

/// Largest acceptable relative duality gap for a pair to count as optimal.
pub const RELATIVE_GAP_TOLERANCE: f64 = 1e-7;

/// Largest cone distance seen per domain tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Violations {
    by_tag: BTreeMap<String, f64>,
}

impl Violations {
    pub fn record(&mut self, tag: &str, distance: f64) {
        self.by_tag
            .entry(tag.to_string())
            .and_modify(|worst| *worst = worst.max(distance))
            .or_insert(distance);
    }

    pub fn get(&self, tag: &str) -> Option<f64> {
        self.by_tag.get(tag).copied()
    }

    /// Largest distance over all tags, zero when nothing was checked.
    pub fn max(&self) -> f64 {
        self.by_tag.values().copied().fold(0.0, f64::max)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.by_tag.iter().map(|(tag, d)| (tag.as_str(), *d))
    }
}

/// Objective value and cone violations of a primal or dual point.
#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    /// Objective value including the objective constant.
    pub objective: f64,
    /// Objective value of the point read as a ray (no constant).
    pub ray_objective: f64,
    /// Violations of the point read as a solution.
    pub solution: Violations,
    /// Violations of the point read as a ray.
    pub ray: Violations,
}

/// Evaluate a primal point `x` against a problem snapshot.
pub fn primal_certificate(
    model: &ProblemModel,
    x: &[f64],
    cones: &ConeRegistry,
) -> VerifyResult<Certificate> {
    require_model(model)?;
    if x.len() != model.varnum() {
        return Err(VerifyError::dimension_mismatch(
            "PRIMVAR",
            model.varnum(),
            x.len(),
        ));
    }
    let coefficients = &model.coefficients;

    let mut ray_objective = 0.0;
    for entry in &coefficients.objective_linear.entries {
        ray_objective += entry.value * at(x, entry.var, "variable")?;
    }

    let mut solution = Violations::default();
    record_primal(&mut solution, model.variables(), x, cones)?;
    let mut ray = solution.clone();

    let mut activity = vec![0.0; model.mapnum()];
    for entry in &coefficients.map_linear.entries {
        *at_mut(&mut activity, entry.row)? += entry.value * at(x, entry.var, "variable")?;
    }
    record_primal(&mut ray, model.maps(), &activity, cones)?;

    for entry in &coefficients.map_constant.entries {
        *at_mut(&mut activity, entry.row)? += entry.value;
    }
    record_primal(&mut solution, model.maps(), &activity, cones)?;

    let integers = model.integer_variables();
    if !integers.is_empty() {
        let values = integers
            .iter()
            .map(|&j| at(x, j, "integer variable"))
            .collect::<VerifyResult<Vec<_>>>()?;
        solution.record(
            INTEGER_TAG,
            cones.get(INTEGER_TAG)?.primal_distance(&values),
        );
    }

    Ok(Certificate {
        objective: coefficients.objective_constant + ray_objective,
        ray_objective,
        solution,
        ray,
    })
}

/// Evaluate a dual point `y` (one value per map row) against a problem
/// snapshot.
pub fn dual_certificate(
    model: &ProblemModel,
    y: &[f64],
    cones: &ConeRegistry,
) -> VerifyResult<Certificate> {
    require_model(model)?;
    let sense = model
        .objective_sense()
        .ok_or(VerifyError::IncompleteModel("the objective sense"))?;
    if y.len() != model.mapnum() {
        return Err(VerifyError::dimension_mismatch(
            "DUALVAR",
            model.mapnum(),
            y.len(),
        ));
    }
    let coefficients = &model.coefficients;

    let mut ray_objective = 0.0;
    for entry in &coefficients.map_constant.entries {
        ray_objective -= entry.value * at(y, entry.row, "map row")?;
    }

    let row_factor = if sense.is_minimize() { 1.0 } else { -1.0 };
    let mut solution = Violations::default();
    record_dual(&mut solution, model.maps(), y, row_factor, cones)?;
    let mut ray = solution.clone();

    let mut activity = vec![0.0; model.varnum()];
    for entry in &coefficients.map_linear.entries {
        *at_mut(&mut activity, entry.var)? += entry.value * at(y, entry.row, "map row")?;
    }
    let column_factor = -row_factor;
    record_dual(&mut ray, model.variables(), &activity, column_factor, cones)?;

    for entry in &coefficients.objective_linear.entries {
        *at_mut(&mut activity, entry.var)? -= entry.value;
    }
    record_dual(&mut solution, model.variables(), &activity, column_factor, cones)?;

    Ok(Certificate {
        objective: coefficients.objective_constant + ray_objective,
        ray_objective,
        solution,
        ray,
    })
}

/// The stacks and every table a certificate reads must have been
/// materialized, not just counted.
fn require_model(model: &ProblemModel) -> VerifyResult<()> {
    if !model.variables().is_materialized() {
        return Err(VerifyError::IncompleteModel("the variable stacks"));
    }
    if !model.maps().is_materialized() {
        return Err(VerifyError::IncompleteModel("the map stacks"));
    }
    let c = &model.coefficients;
    if c.objective_linear.entries.len() != c.objective_linear.nnz {
        return Err(VerifyError::IncompleteModel("the OBJACOORD entries"));
    }
    if c.map_linear.entries.len() != c.map_linear.nnz {
        return Err(VerifyError::IncompleteModel("the ACOORD entries"));
    }
    if c.map_constant.entries.len() != c.map_constant.nnz {
        return Err(VerifyError::IncompleteModel("the BCOORD entries"));
    }
    Ok(())
}

fn at(values: &[f64], index: usize, what: &str) -> VerifyResult<f64> {
    values.get(index).copied().ok_or_else(|| {
        CbfError::index_out_of_range(what, index as i64, values.len(), 0).into()
    })
}

fn at_mut(values: &mut [f64], index: usize) -> VerifyResult<&mut f64> {
    let len = values.len();
    values
        .get_mut(index)
        .ok_or_else(|| CbfError::index_out_of_range("coefficient", index as i64, len, 0).into())
}

fn record_primal(
    out: &mut Violations,
    stacks: &Stacks,
    values: &[f64],
    cones: &ConeRegistry,
) -> VerifyResult<()> {
    for (offset, stack) in stacks.with_offsets() {
        let tag = stack.domain.tag();
        let part = &values[offset..offset + stack.dim];
        out.record(tag, cones.get(tag)?.primal_distance(part));
    }
    Ok(())
}

fn record_dual(
    out: &mut Violations,
    stacks: &Stacks,
    values: &[f64],
    factor: f64,
    cones: &ConeRegistry,
) -> VerifyResult<()> {
    let mut scaled = Vec::new();
    for (offset, stack) in stacks.with_offsets() {
        let tag = stack.domain.tag();
        scaled.clear();
        scaled.extend(values[offset..offset + stack.dim].iter().map(|v| v * factor));
        out.record(
            &format!("{}*", tag),
            cones.get(tag)?.dual_distance(&scaled),
        );
    }
    Ok(())
}

/// What a solver run established about the objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectiveStatus {
    /// Attained objective value.
    Value(f64),
    PrimalInfeasible,
    DualInfeasible,
    /// Integer problem without a feasible point.
    Infeasible,
    /// Integer problem with a feasible point and an improving ray.
    Unbounded,
    /// Integer problem with an improving ray but no feasible point.
    UnboundedIfFeasible,
    /// Nothing to go on.
    Unknown,
}

impl fmt::Display for ObjectiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.write_str(&format_e4(*v)),
            Self::PrimalInfeasible => f.write_str("Primal infeasible"),
            Self::DualInfeasible => f.write_str("Dual infeasible"),
            Self::Infeasible => f.write_str("Infeasible"),
            Self::Unbounded => f.write_str("Unbound"),
            Self::UnboundedIfFeasible => f.write_str("Unbound if feasible"),
            Self::Unknown => f.write_str("?"),
        }
    }
}

/// How well an [`ObjectiveStatus`] is backed by certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Backed by certificates within tolerance.
    Certain,
    /// A feasible point exists, optimality is not certified.
    FeasibleOnly,
    /// Best guess from the smallest violation.
    Approximate,
}

impl Confidence {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Certain => "",
            Self::FeasibleOnly => "v",
            Self::Approximate => "a",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub status: ObjectiveStatus,
    pub confidence: Confidence,
}

impl Assessment {
    fn certain(status: ObjectiveStatus) -> Self {
        Self {
            status,
            confidence: Confidence::Certain,
        }
    }

    fn with(status: ObjectiveStatus, confidence: Confidence) -> Self {
        Self { status, confidence }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        match self.confidence {
            Confidence::Certain => Ok(()),
            other => write!(f, " ({})", other.marker()),
        }
    }
}

/// Certificate errors gathered from a solution. Missing evidence is
/// infinitely bad.
#[derive(Debug, Clone, Copy)]
struct Evidence {
    primal_objective: f64,
    primal_error: f64,
    primal_infeasibility_error: f64,
    dual_objective: f64,
    dual_error: f64,
    dual_infeasibility_error: f64,
}

impl Evidence {
    fn none() -> Self {
        Self {
            primal_objective: f64::NAN,
            primal_error: f64::INFINITY,
            primal_infeasibility_error: f64::INFINITY,
            dual_objective: f64::NAN,
            dual_error: f64::INFINITY,
            dual_infeasibility_error: f64::INFINITY,
        }
    }

    fn is_empty(&self) -> bool {
        [
            self.primal_error,
            self.primal_infeasibility_error,
            self.dual_infeasibility_error,
        ]
        .iter()
        .all(|e| *e == f64::INFINITY)
    }
}

/// Classify what a solution establishes about a problem snapshot.
pub fn assess(
    model: &ProblemModel,
    solution: &Solution,
    cones: &ConeRegistry,
) -> VerifyResult<Assessment> {
    let minimize = model
        .objective_sense()
        .ok_or(VerifyError::IncompleteModel("the objective sense"))?
        .is_minimize();
    let mut evidence = Evidence::none();

    if !solution.primal_vars.is_empty() {
        let cert = primal_certificate(model, &solution.primal_vars, cones)?;
        evidence.primal_objective = cert.objective;
        evidence.primal_error = cert.solution.max();
        let improving = if minimize {
            cert.ray_objective < 0.0
        } else {
            cert.ray_objective > 0.0
        };
        if improving {
            evidence.dual_infeasibility_error = cert.ray.max();
        }
    }

    if !solution.dual_vars.is_empty() {
        let cert = dual_certificate(model, &solution.dual_vars, cones)?;
        evidence.dual_objective = cert.objective;
        evidence.dual_error = cert.solution.max();
        let improving = if minimize {
            cert.ray_objective > 0.0
        } else {
            cert.ray_objective < 0.0
        };
        if improving {
            evidence.primal_infeasibility_error = cert.ray.max();
        }
    }

    debug!(
        instance = %model.name,
        snapshot = model.snapshot,
        primal_error = evidence.primal_error,
        dual_error = evidence.dual_error,
        "certificates evaluated"
    );

    let assessment = if model.integer_variables().is_empty() {
        classify_continuous(&evidence, minimize)
    } else {
        classify_integer(&evidence, solution.claim)
    };
    Ok(assessment)
}

fn classify_continuous(e: &Evidence, minimize: bool) -> Assessment {
    use ObjectiveStatus::*;

    if e.is_empty() {
        return Assessment::certain(Unknown);
    }

    let direction = if minimize { 1.0 } else { -1.0 };
    let gap = direction * (e.primal_objective - e.dual_objective);
    let scale = 1f64
        .max(e.primal_objective.abs())
        .max(e.dual_objective.abs());
    if e.primal_error <= FEASIBILITY_TOLERANCE
        && e.dual_error <= FEASIBILITY_TOLERANCE
        && (gap <= FEASIBILITY_TOLERANCE || gap / scale <= RELATIVE_GAP_TOLERANCE)
    {
        return Assessment::certain(Value(e.primal_objective));
    }

    if e.primal_infeasibility_error <= FEASIBILITY_TOLERANCE {
        return Assessment::certain(PrimalInfeasible);
    }
    if e.dual_infeasibility_error <= FEASIBILITY_TOLERANCE {
        return Assessment::certain(DualInfeasible);
    }
    if e.primal_error <= FEASIBILITY_TOLERANCE {
        return Assessment::with(Value(e.primal_objective), Confidence::FeasibleOnly);
    }

    let status = if e.primal_error <= e.primal_infeasibility_error
        && e.primal_error <= e.dual_infeasibility_error
    {
        Value(e.primal_objective)
    } else if e.primal_infeasibility_error <= e.dual_infeasibility_error {
        PrimalInfeasible
    } else {
        DualInfeasible
    };
    Assessment::with(status, Confidence::Approximate)
}

fn classify_integer(e: &Evidence, claim: Option<Claim>) -> Assessment {
    use ObjectiveStatus::*;

    if e.is_empty() && claim != Some(Claim::IntegerInfeasibility) {
        return Assessment::certain(Unknown);
    }

    if claim == Some(Claim::IntegerOptimality) && e.primal_error <= FEASIBILITY_TOLERANCE {
        return Assessment::certain(Value(e.primal_objective));
    }
    if claim == Some(Claim::IntegerInfeasibility)
        || e.primal_infeasibility_error <= FEASIBILITY_TOLERANCE
    {
        return Assessment::certain(Infeasible);
    }
    if e.dual_infeasibility_error <= FEASIBILITY_TOLERANCE {
        let status = if e.primal_error <= FEASIBILITY_TOLERANCE {
            Unbounded
        } else {
            UnboundedIfFeasible
        };
        return Assessment::certain(status);
    }
    if e.primal_error <= FEASIBILITY_TOLERANCE {
        return Assessment::with(Value(e.primal_objective), Confidence::FeasibleOnly);
    }

    let status = if e.primal_error <= e.primal_infeasibility_error
        && e.primal_error <= e.dual_infeasibility_error
    {
        Value(e.primal_objective)
    } else if e.primal_infeasibility_error <= e.dual_infeasibility_error {
        Infeasible
    } else {
        UnboundedIfFeasible
    };
    Assessment::with(status, Confidence::Approximate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violations_keep_maximum() {
        let mut v = Violations::default();
        v.record("Q", 0.5);
        v.record("Q", 0.25);
        v.record("L+", 1.0);
        assert_eq!(v.get("Q"), Some(0.5));
        assert_eq!(v.max(), 1.0);
        assert_eq!(Violations::default().max(), 0.0);
        let tags: Vec<&str> = v.iter().map(|(t, _)| t).collect();
        assert_eq!(tags, vec!["L+", "Q"]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ObjectiveStatus::Value(3.0).to_string(), "3.0000E+00");
        assert_eq!(ObjectiveStatus::Unknown.to_string(), "?");
        let a = Assessment::with(ObjectiveStatus::PrimalInfeasible, Confidence::Approximate);
        assert_eq!(a.to_string(), "Primal infeasible (a)");
        assert_eq!(
            Assessment::certain(ObjectiveStatus::Unbounded).to_string(),
            "Unbound"
        );
    }

    #[test]
    fn test_continuous_relative_gap() {
        let e = Evidence {
            primal_objective: 1e6,
            primal_error: 0.0,
            dual_objective: 1e6 - 0.05,
            dual_error: 0.0,
            ..Evidence::none()
        };
        assert_eq!(
            classify_continuous(&e, true),
            Assessment::certain(ObjectiveStatus::Value(1e6))
        );
        let wide = Evidence {
            dual_objective: 1e6 - 10.0,
            ..e
        };
        assert_eq!(
            classify_continuous(&wide, true).confidence,
            Confidence::FeasibleOnly
        );
    }

    #[test]
    fn test_continuous_best_guess() {
        let e = Evidence {
            primal_error: 0.5,
            primal_infeasibility_error: 0.1,
            ..Evidence::none()
        };
        assert_eq!(
            classify_continuous(&e, true),
            Assessment::with(ObjectiveStatus::PrimalInfeasible, Confidence::Approximate)
        );
    }

    #[test]
    fn test_integer_claims() {
        let none = Evidence::none();
        assert_eq!(
            classify_integer(&none, Some(Claim::IntegerInfeasibility)),
            Assessment::certain(ObjectiveStatus::Infeasible)
        );
        assert_eq!(
            classify_integer(&none, None),
            Assessment::certain(ObjectiveStatus::Unknown)
        );
        assert_eq!(
            classify_integer(&none, Some(Claim::IntegerOptimality)),
            Assessment::certain(ObjectiveStatus::Unknown)
        );
        let ray_only = Evidence {
            dual_infeasibility_error: 0.0,
            ..Evidence::none()
        };
        assert_eq!(
            classify_integer(&ray_only, None).status,
            ObjectiveStatus::UnboundedIfFeasible
        );
    }
}
