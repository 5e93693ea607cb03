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

//! Solution files.
//!
//! A solution file holds, per snapshot of a problem, an optional solver
//! claim followed by primal and dual values:
//!
//! ```text
//! CLAIM
//! INTEGER_OPTIMALITY
//!
//! PRIMVAR
//! 1
//! 0.5
//!
//! DUALVAR
//! -2
//!
//! ```
//!
//! Blocks hold one value per line, in variable (or map) order; PSD blocks
//! hold the lower triangles of each matrix one after the other, row by row.
//! Snapshots of a problem with `CHANGE` markers are separated by a
//! `CHANGE` line.

use crate::format::format_g16;
use cbf_core::{CbfError, CbfResult, Structure};
use cbf_stream::{Line, LineReader};
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// What a solver claims about a solution it could not fully certify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Claim {
    IntegerOptimality,
    IntegerInfeasibility,
    Unstable,
}

impl Claim {
    pub const ALL: [Claim; 3] = [
        Claim::IntegerOptimality,
        Claim::IntegerInfeasibility,
        Claim::Unstable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntegerOptimality => "INTEGER_OPTIMALITY",
            Self::IntegerInfeasibility => "INTEGER_INFEASIBILITY",
            Self::Unstable => "UNSTABLE",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|claim| claim.as_str() == text)
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values reported by a solver for one snapshot of a problem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    pub claim: Option<Claim>,
    pub primal_vars: Vec<f64>,
    /// Lower triangle of each PSD variable.
    pub primal_psd_vars: Vec<Vec<f64>>,
    pub dual_vars: Vec<f64>,
    /// Lower triangle of each PSD map's dual matrix.
    pub dual_psd_vars: Vec<Vec<f64>>,
}

impl Solution {
    pub fn is_empty(&self) -> bool {
        self.claim.is_none()
            && self.primal_vars.is_empty()
            && self.primal_psd_vars.is_empty()
            && self.dual_vars.is_empty()
            && self.dual_psd_vars.is_empty()
    }

    /// Write the non-empty blocks of this solution.
    pub fn write_to<W: Write>(&self, out: &mut W) -> CbfResult<()> {
        if let Some(claim) = self.claim {
            writeln!(out, "CLAIM\n{}\n", claim)?;
        }
        write_block(out, "PRIMVAR", self.primal_vars.iter())?;
        write_block(out, "PRIMPSDVAR", self.primal_psd_vars.iter().flatten())?;
        write_block(out, "DUALVAR", self.dual_vars.iter())?;
        write_block(out, "DUALPSDVAR", self.dual_psd_vars.iter().flatten())?;
        Ok(())
    }
}

fn write_block<'a, W: Write>(
    out: &mut W,
    keyword: &str,
    values: impl Iterator<Item = &'a f64>,
) -> CbfResult<()> {
    let mut values = values.peekable();
    if values.peek().is_none() {
        return Ok(());
    }
    writeln!(out, "{}", keyword)?;
    for value in values {
        writeln!(out, "{}", format_g16(*value))?;
    }
    writeln!(out)?;
    Ok(())
}

/// Write the solutions of consecutive snapshots, separated by `CHANGE`.
pub fn write_solutions<W: Write>(out: &mut W, solutions: &[Solution]) -> CbfResult<()> {
    for (i, solution) in solutions.iter().enumerate() {
        if i > 0 {
            writeln!(out, "CHANGE\n")?;
        }
        solution.write_to(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Dimensions a solution file is read against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolutionShape {
    pub varnum: usize,
    pub mapnum: usize,
    /// Side lengths of the PSD variables.
    pub psd_variable_dims: Vec<usize>,
    /// Side lengths of the PSD maps.
    pub psd_map_dims: Vec<usize>,
}

impl SolutionShape {
    pub fn from_structure(structure: &Structure) -> Self {
        Self {
            varnum: structure.varnum(),
            mapnum: structure.mapnum(),
            psd_variable_dims: structure.psd_variables.items.clone(),
            psd_map_dims: structure.psd_maps.items.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Claim,
    PrimVar,
    PrimPsdVar,
    DualVar,
    DualPsdVar,
}

impl Block {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "CLAIM" => Some(Self::Claim),
            "PRIMVAR" => Some(Self::PrimVar),
            "PRIMPSDVAR" => Some(Self::PrimPsdVar),
            "DUALVAR" => Some(Self::DualVar),
            "DUALPSDVAR" => Some(Self::DualPsdVar),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Read every snapshot's solution from a solution document.
///
/// A document without content yields a single empty solution.
pub fn read_solutions<R: Read>(
    mut reader: LineReader<R>,
    shape: &SolutionShape,
) -> CbfResult<Vec<Solution>> {
    let mut solutions = Vec::new();
    let mut current = Solution::default();
    let mut seen = 0u8;

    while let Some(line) = reader.next_significant()? {
        if line.text == "CHANGE" {
            solutions.push(std::mem::take(&mut current));
            seen = 0;
            continue;
        }

        let block = Block::from_keyword(&line.text).ok_or_else(|| {
            CbfError::unrecognized_keyword(&line.text, line.number).with_text(line.text.as_str())
        })?;
        if seen & block.bit() != 0 {
            return Err(CbfError::duplicate_keyword(&line.text, line.number));
        }
        seen |= block.bit();

        match block {
            Block::Claim => {
                let value = reader.expect_raw("CLAIM")?;
                let claim = Claim::parse(&value.text).ok_or_else(|| {
                    CbfError::invalid_value(
                        format!("unknown claim '{}'", value.text),
                        value.number,
                    )
                    .with_text(value.text.as_str())
                })?;
                current.claim = Some(claim);
            }
            Block::PrimVar => {
                current.primal_vars = read_values(&mut reader, shape.varnum, "PRIMVAR")?;
            }
            Block::DualVar => {
                current.dual_vars = read_values(&mut reader, shape.mapnum, "DUALVAR")?;
            }
            Block::PrimPsdVar => {
                current.primal_psd_vars =
                    read_triangles(&mut reader, &shape.psd_variable_dims, "PRIMPSDVAR")?;
            }
            Block::DualPsdVar => {
                current.dual_psd_vars =
                    read_triangles(&mut reader, &shape.psd_map_dims, "DUALPSDVAR")?;
            }
        }
    }

    solutions.push(current);
    debug!(snapshots = solutions.len(), "read solution document");
    Ok(solutions)
}

/// Open and read a solution file, decompressing `.gz` files transparently.
pub fn read_solution_file(
    path: impl AsRef<Path>,
    shape: &SolutionShape,
) -> CbfResult<Vec<Solution>> {
    let (_, reader) = LineReader::open(path)?;
    read_solutions(reader, shape)
}

fn read_values<R: Read>(
    reader: &mut LineReader<R>,
    count: usize,
    context: &str,
) -> CbfResult<Vec<f64>> {
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let line = reader.expect_raw(context)?;
        values.push(parse_value(&line)?);
    }
    Ok(values)
}

fn read_triangles<R: Read>(
    reader: &mut LineReader<R>,
    dims: &[usize],
    context: &str,
) -> CbfResult<Vec<Vec<f64>>> {
    dims.iter()
        .map(|&dim| read_values(reader, dim * (dim + 1) / 2, context))
        .collect()
}

fn parse_value(line: &Line) -> CbfResult<f64> {
    line.text.parse::<f64>().map_err(|_| {
        CbfError::invalid_value(format!("invalid number '{}'", line.text), line.number)
            .with_text(line.text.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbf_core::CbfErrorKind;
    use std::io::Cursor;

    fn shape(varnum: usize, mapnum: usize) -> SolutionShape {
        SolutionShape {
            varnum,
            mapnum,
            ..SolutionShape::default()
        }
    }

    fn read(input: &str, shape: &SolutionShape) -> CbfResult<Vec<Solution>> {
        read_solutions(LineReader::new(Cursor::new(input)), shape)
    }

    fn written(solutions: &[Solution]) -> String {
        let mut out = Vec::new();
        write_solutions(&mut out, solutions).unwrap();
        String::from_utf8(out).unwrap()
    }

    // ==================== Claims ====================

    #[test]
    fn test_claim_parse() {
        assert_eq!(Claim::parse("UNSTABLE"), Some(Claim::Unstable));
        assert_eq!(
            Claim::parse("INTEGER_OPTIMALITY"),
            Some(Claim::IntegerOptimality)
        );
        assert_eq!(Claim::parse("unstable"), None);
        assert_eq!(Claim::parse("OPTIMAL"), None);
    }

    // ==================== Writer ====================

    #[test]
    fn test_write_omits_empty_blocks() {
        let solution = Solution {
            primal_vars: vec![1.0, 0.5],
            ..Solution::default()
        };
        assert_eq!(written(&[solution]), "PRIMVAR\n1\n0.5\n\n");
    }

    #[test]
    fn test_write_all_blocks_in_order() {
        let solution = Solution {
            claim: Some(Claim::Unstable),
            primal_vars: vec![3.0],
            primal_psd_vars: vec![vec![1.0, 0.0, 2.0]],
            dual_vars: vec![-0.25],
            dual_psd_vars: vec![vec![1e-20]],
        };
        assert_eq!(
            written(&[solution]),
            "CLAIM\nUNSTABLE\n\nPRIMVAR\n3\n\nPRIMPSDVAR\n1\n0\n2\n\nDUALVAR\n-0.25\n\nDUALPSDVAR\n1e-20\n\n"
        );
    }

    #[test]
    fn test_write_separates_snapshots() {
        let first = Solution {
            primal_vars: vec![1.0],
            ..Solution::default()
        };
        let second = Solution {
            primal_vars: vec![2.0],
            ..Solution::default()
        };
        assert_eq!(
            written(&[first, second]),
            "PRIMVAR\n1\n\nCHANGE\n\nPRIMVAR\n2\n\n"
        );
    }

    // ==================== Reader ====================

    #[test]
    fn test_read_written_document() {
        let solution = Solution {
            claim: Some(Claim::IntegerOptimality),
            primal_vars: vec![0.1, 1.0 / 3.0],
            dual_vars: vec![-7.0],
            ..Solution::default()
        };
        let text = written(&[solution.clone(), solution.clone()]);
        let solutions = read(&text, &shape(2, 1)).unwrap();
        assert_eq!(solutions, vec![solution.clone(), solution]);
    }

    #[test]
    fn test_read_psd_blocks_split_by_dimension() {
        let shape = SolutionShape {
            psd_variable_dims: vec![2, 1],
            ..SolutionShape::default()
        };
        let solutions = read("PRIMPSDVAR\n1\n2\n3\n4\n", &shape).unwrap();
        assert_eq!(
            solutions[0].primal_psd_vars,
            vec![vec![1.0, 2.0, 3.0], vec![4.0]]
        );
    }

    #[test]
    fn test_read_empty_document() {
        let solutions = read("\n\n", &shape(3, 3)).unwrap();
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].is_empty());
    }

    #[test]
    fn test_read_duplicate_block() {
        let err = read("PRIMVAR\n1\nPRIMVAR\n1\n", &shape(1, 0)).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::DuplicateKeyword);
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_read_same_block_after_change() {
        let solutions = read("PRIMVAR\n1\nCHANGE\nPRIMVAR\n2\n", &shape(1, 0)).unwrap();
        assert_eq!(solutions.len(), 2);
        assert_eq!(solutions[1].primal_vars, vec![2.0]);
    }

    #[test]
    fn test_read_unknown_keyword() {
        let err = read("OBJVAL\n1\n", &shape(1, 0)).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::UnrecognizedKeyword);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_read_unknown_claim() {
        let err = read("CLAIM\nOPTIMAL\n", &shape(0, 0)).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::InvalidValue);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_read_truncated_block() {
        let err = read("DUALVAR\n1\n", &shape(0, 2)).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::UnexpectedEndOfFile);
    }

    #[test]
    fn test_read_invalid_number() {
        let err = read("PRIMVAR\nx1\n", &shape(1, 0)).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::InvalidValue);
        assert_eq!(err.text.as_deref(), Some("x1"));
    }

    #[test]
    fn test_read_rejects_wide_lines() {
        let input = format!("PRIMVAR\n{}\n", "1".repeat(511));
        let err = read(&input, &shape(1, 0)).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::LineTooWide);
    }
}
