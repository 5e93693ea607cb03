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

//! Solution verification for CBF problems
//!
//! Reads and writes solution files, measures distances to the CBF cones,
//! and checks solver output against a parsed problem.
//!
//! ```rust,no_run
//! use cbf_stream::{ParserConfig, SnapshotParser};
//! use cbf_verify::{assess_document, read_solution_file, ConeRegistry, SolutionShape};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let models = SnapshotParser::open("instance.cbf", ParserConfig::default())?.collect_all()?;
//! let shape = SolutionShape::from_structure(&models[0].structure);
//! let solutions = read_solution_file("instance.sol", &shape)?;
//!
//! let cones = ConeRegistry::with_builtins();
//! for (model, assessment) in models.iter().zip(assess_document(&models, &solutions, &cones)?) {
//!     println!("{} #{}: {}", model.name, model.snapshot, assessment);
//! }
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod cones;
mod error;
mod format;
mod solution;

pub use certificate::{
    assess, dual_certificate, primal_certificate, Assessment, Certificate, Confidence,
    ObjectiveStatus, Violations, FEASIBILITY_TOLERANCE, RELATIVE_GAP_TOLERANCE,
};
pub use cones::{ConeDistance, ConeRegistry};
pub use error::{VerifyError, VerifyResult};
pub use format::{format_e4, format_g16};
pub use solution::{
    read_solution_file, read_solutions, write_solutions, Claim, Solution, SolutionShape,
};

use cbf_core::ProblemModel;

/// Assess every snapshot of a problem against the matching solution.
pub fn assess_document(
    models: &[ProblemModel],
    solutions: &[Solution],
    cones: &ConeRegistry,
) -> VerifyResult<Vec<Assessment>> {
    if models.len() != solutions.len() {
        return Err(VerifyError::dimension_mismatch(
            "solution snapshots",
            models.len(),
            solutions.len(),
        ));
    }
    models
        .iter()
        .zip(solutions)
        .map(|(model, solution)| assess(model, solution, cones))
        .collect()
}
