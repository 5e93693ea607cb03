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

//! Core data model for the Conic Benchmark Format (CBF).
//!
//! This crate holds everything that does not depend on where the text
//! comes from:
//!
//! - the keyword grammar and its ordering rules ([`GrammarState`])
//! - query keys, including `:HEAD` and conditional `A=>B` forms
//!   ([`KeyQuery`], [`QueryResolver`])
//! - the problem model produced for every snapshot ([`ProblemModel`])
//! - simple-bound derivation ([`SimpleBoundTracker`])
//!
//! The streaming parser lives in `cbf-stream`.

pub mod bounds;
pub mod domain;
mod error;
pub mod keyword;
mod limits;
pub mod model;
pub mod query;

pub use bounds::{simple_bounds_possible, SimpleBoundTracker};
pub use domain::Domain;
pub use error::{CbfError, CbfErrorKind, CbfResult};
pub use keyword::{GrammarState, Keyword, KeywordGroup, KeywordSet, Layout, Step};
pub use limits::{Limits, DEFAULT_MAX_LINE_WIDTH};
pub use model::{
    Coefficients, ObjectiveSense, ProblemModel, Stack, Stacks, Structure, VariableBounds,
};
pub use query::{Demand, KeyQuery, QueryKey, QueryResolver, StructuralCounts};
