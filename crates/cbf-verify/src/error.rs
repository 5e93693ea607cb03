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

//! Error types for solution handling and verification.

use cbf_core::CbfError;
use thiserror::Error;

/// Errors raised while reading solutions or evaluating certificates.
#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    /// The problem or solution file could not be parsed.
    #[error(transparent)]
    Parse(#[from] CbfError),

    /// A solution vector does not match the problem's dimensions.
    #[error("{what} has {found} values, problem declares {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// No distance function is registered for a domain tag.
    #[error("no distance function registered for cone '{0}'")]
    UnknownCone(String),

    /// The model was parsed without data a certificate needs.
    #[error("model is missing {0}; parse the problem with the full query")]
    IncompleteModel(&'static str),
}

impl VerifyError {
    pub fn dimension_mismatch(what: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            found,
        }
    }
}

/// Result type for verification operations.
pub type VerifyResult<T> = Result<T, VerifyError>;
