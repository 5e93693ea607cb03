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

//! Streaming CBF parser
//!
//! Reads Conic Benchmark Format documents line by line and yields one
//! [`ProblemModel`] per snapshot. Only the blocks named in the caller's
//! query are materialized; the rest are skipped by line count, and parsing
//! stops as soon as the query is satisfied.
//!
//! # Features
//!
//! - **Partial parsing**: `KW`, `KW:HEAD` and conditional `A=>B` query keys
//! - **CHANGE snapshots**: a lazy iterator, one snapshot per pass
//! - **Simple bounds**: derived per snapshot when the query allows it
//! - **Compressed input**: `.gz` files are decompressed transparently
//! - **Batch processing**: parallel summaries of many files with Rayon
//!
//! ```rust,no_run
//! use cbf_stream::{ParserConfig, SnapshotParser};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! for model in SnapshotParser::open("instance.cbf.gz", ParserConfig::default())? {
//!     let model = model?;
//!     println!("{} #{}: {} variables", model.name, model.snapshot, model.varnum());
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
mod builder;
mod parser;
mod reader;

pub use builder::{Flow, ParseState, ProblemBuilder};
pub use parser::{ParserConfig, SnapshotParser};
pub use reader::{instance_name, Line, LineReader, DEFAULT_BUFFER_SIZE};

/// Re-export core types for convenience.
pub use cbf_core::{CbfError, CbfErrorKind, CbfResult, KeyQuery, ProblemModel};
