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

//! Batch processing for multiple CBF files.
//!
//! Runs a [`BatchOperation`] over a set of files, in parallel with Rayon
//! when the batch is large enough. A failing file never aborts the batch:
//! every file gets its own [`FileResult`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use cbf_core::KeyQuery;
//! use cbf_stream::batch::{BatchConfig, BatchProcessor, SummaryOperation};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let processor = BatchProcessor::new(BatchConfig::default());
//! let files = vec![PathBuf::from("a.cbf.gz"), PathBuf::from("b.cbf")];
//!
//! let operation = SummaryOperation::new(KeyQuery::parse(["VAR:HEAD", "CON:HEAD", "INT:HEAD"])?);
//! let results = processor.process(&files, operation, true)?;
//!
//! for summary in results.successes().filter_map(|r| r.result.as_ref().ok()) {
//!     println!("{}: {} variables, {} rows", summary.name, summary.counts.var, summary.counts.con);
//! }
//! # Ok(())
//! # }
//! ```

use crate::parser::{ParserConfig, SnapshotParser};
use cbf_core::{CbfError, CbfResult, KeyQuery, StructuralCounts};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Configuration for batch processing.
///
/// # Examples
///
/// ```rust
/// use cbf_stream::batch::BatchConfig;
///
/// let config = BatchConfig {
///     parallel_threshold: 5,  // Parallelize if >= 5 files
///     max_threads: Some(4),   // Use at most 4 threads
///     progress_interval: 10,  // Log progress every 10 files
/// };
/// ```
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Minimum number of files to trigger parallel processing.
    ///
    /// Default: 10
    pub parallel_threshold: usize,

    /// Maximum number of threads for parallel processing.
    ///
    /// None means Rayon's global pool. Default: None
    pub max_threads: Option<usize>,

    /// Number of files between progress log lines. 0 disables them.
    ///
    /// Default: 1
    pub progress_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 10,
            max_threads: None,
            progress_interval: 1,
        }
    }
}

/// Result of processing a single file.
#[derive(Debug, Clone)]
pub struct FileResult<T> {
    pub path: PathBuf,
    pub result: CbfResult<T>,
}

impl<T> FileResult<T> {
    pub fn success(path: PathBuf, value: T) -> Self {
        Self {
            path,
            result: Ok(value),
        }
    }

    pub fn failure(path: PathBuf, error: CbfError) -> Self {
        Self {
            path,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

/// Aggregated results of a batch, in input order.
#[derive(Debug, Clone)]
pub struct BatchResults<T> {
    pub results: Vec<FileResult<T>>,
    /// Total processing time in milliseconds
    pub elapsed_ms: u128,
}

impl<T> BatchResults<T> {
    pub fn new(results: Vec<FileResult<T>>, elapsed_ms: u128) -> Self {
        Self {
            results,
            elapsed_ms,
        }
    }

    pub fn total_files(&self) -> usize {
        self.results.len()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.is_success())
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.is_failure())
    }

    pub fn successes(&self) -> impl Iterator<Item = &FileResult<T>> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileResult<T>> {
        self.results.iter().filter(|r| r.is_failure())
    }

    /// Files per second.
    pub fn throughput(&self) -> f64 {
        if self.elapsed_ms == 0 {
            0.0
        } else {
            (self.total_files() as f64) / (self.elapsed_ms as f64 / 1000.0)
        }
    }
}

/// An operation applied to every file of a batch.
///
/// Operations must be `Send + Sync` so that files can be processed in
/// parallel.
pub trait BatchOperation: Send + Sync {
    type Output: Send;

    /// Process one file.
    fn process_file(&self, path: &Path) -> CbfResult<Self::Output>;

    /// Name used in progress logs.
    fn name(&self) -> &str;
}

/// Lock-free progress counters.
#[derive(Debug)]
struct ProgressTracker {
    total: usize,
    processed: AtomicUsize,
    failed: AtomicUsize,
    interval: usize,
    start_time: Instant,
}

impl ProgressTracker {
    fn new(total: usize, interval: usize) -> Self {
        Self {
            total,
            processed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            interval,
            start_time: Instant::now(),
        }
    }

    fn record<T>(&self, path: &Path, result: &CbfResult<T>) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Err(e) = result {
            self.failed.fetch_add(1, Ordering::Relaxed);
            warn!(path = %path.display(), error = %e, "file failed");
        }
        if self.should_report(processed) {
            let rate = processed as f64 / self.start_time.elapsed().as_secs_f64();
            info!(
                processed,
                total = self.total,
                failed = self.failed.load(Ordering::Relaxed),
                files_per_s = rate,
                "batch progress"
            );
        }
    }

    fn should_report(&self, processed: usize) -> bool {
        self.interval > 0 && (processed % self.interval == 0 || processed == self.total)
    }

    fn summary(&self, operation: &str) {
        info!(
            operation,
            processed = self.processed.load(Ordering::Relaxed),
            failed = self.failed.load(Ordering::Relaxed),
            elapsed_s = self.start_time.elapsed().as_secs_f64(),
            "batch complete"
        );
    }
}

/// Runs batch operations serially or in parallel.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn default_config() -> Self {
        Self::new(BatchConfig::default())
    }

    /// Process every file with `operation`.
    ///
    /// Fails only when a dedicated thread pool cannot be created; per-file
    /// failures are reported in the results.
    pub fn process<O>(
        &self,
        files: &[PathBuf],
        operation: O,
        show_progress: bool,
    ) -> CbfResult<BatchResults<O::Output>>
    where
        O: BatchOperation,
    {
        let start_time = Instant::now();
        if files.is_empty() {
            return Ok(BatchResults::new(vec![], 0));
        }

        let tracker = show_progress
            .then(|| ProgressTracker::new(files.len(), self.config.progress_interval));

        let results = if files.len() < self.config.parallel_threshold {
            files
                .iter()
                .map(|path| run_one(&operation, path, tracker.as_ref()))
                .collect()
        } else {
            let run = || -> Vec<FileResult<O::Output>> {
                files
                    .par_iter()
                    .map(|path| run_one(&operation, path, tracker.as_ref()))
                    .collect()
            };
            match self.config.max_threads {
                Some(n) => rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| CbfError::io(format!("cannot build thread pool: {}", e)))?
                    .install(run),
                None => run(),
            }
        };

        if let Some(t) = &tracker {
            t.summary(operation.name());
        }
        Ok(BatchResults::new(results, start_time.elapsed().as_millis()))
    }
}

fn run_one<O: BatchOperation>(
    operation: &O,
    path: &Path,
    tracker: Option<&ProgressTracker>,
) -> FileResult<O::Output> {
    let result = operation.process_file(path);
    if let Some(t) = tracker {
        t.record(path, &result);
    }
    FileResult {
        path: path.to_path_buf(),
        result,
    }
}

// ============================================================================
// Standard Operations
// ============================================================================

/// Header-level facts about one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSummary {
    pub name: String,
    pub version: Option<u32>,
    pub counts: StructuralCounts,
    /// Number of snapshots produced.
    pub snapshots: usize,
    /// Whether simple bounds were derived for the last snapshot.
    pub simple_bounds: bool,
}

/// Parse each file with a query and summarize it.
#[derive(Debug, Clone)]
pub struct SummaryOperation {
    pub config: ParserConfig,
}

impl SummaryOperation {
    pub fn new(query: KeyQuery) -> Self {
        Self {
            config: ParserConfig::with_query(query),
        }
    }
}

impl BatchOperation for SummaryOperation {
    type Output = InstanceSummary;

    fn process_file(&self, path: &Path) -> CbfResult<Self::Output> {
        let parser = SnapshotParser::open(path, self.config.clone())?;
        let name = parser.name().to_string();

        let mut last = None;
        let mut snapshots = 0;
        for model in parser {
            last = Some(model?);
            snapshots += 1;
        }

        let (version, counts, simple_bounds) = match &last {
            Some(m) => (m.version(), m.structure.counts(), m.simple_bounds_available()),
            None => (None, StructuralCounts::default(), false),
        };
        Ok(InstanceSummary {
            name,
            version,
            counts,
            snapshots,
            simple_bounds,
        })
    }

    fn name(&self) -> &str {
        "summary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbf_core::CbfErrorKind;

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.parallel_threshold, 10);
        assert!(config.max_threads.is_none());
        assert_eq!(config.progress_interval, 1);
    }

    #[test]
    fn test_file_result_failure() {
        let result: FileResult<()> =
            FileResult::failure(PathBuf::from("x.cbf"), CbfError::io("gone"));
        assert!(result.is_failure());
        assert!(!result.is_success());
    }

    #[test]
    fn test_batch_results_statistics() {
        let results = vec![
            FileResult::success(PathBuf::from("a.cbf"), ()),
            FileResult::success(PathBuf::from("b.cbf"), ()),
            FileResult::failure(PathBuf::from("c.cbf"), CbfError::io("gone")),
        ];
        let batch = BatchResults::new(results, 1000);

        assert_eq!(batch.total_files(), 3);
        assert_eq!(batch.success_count(), 2);
        assert_eq!(batch.failure_count(), 1);
        assert!(!batch.all_succeeded());
        assert!(batch.has_failures());
        assert!((batch.throughput() - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_progress_tracker_should_report() {
        let tracker = ProgressTracker::new(100, 10);
        assert!(!tracker.should_report(9));
        assert!(tracker.should_report(10));
        assert!(tracker.should_report(100));

        let silent = ProgressTracker::new(5, 0);
        assert!(!silent.should_report(5));
    }

    struct MockOperation {
        should_fail: bool,
    }

    impl BatchOperation for MockOperation {
        type Output = String;

        fn process_file(&self, path: &Path) -> CbfResult<Self::Output> {
            if self.should_fail {
                Err(CbfError::io("mock failure"))
            } else {
                Ok(path.to_string_lossy().to_string())
            }
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[test]
    fn test_batch_processor_empty() {
        let results = BatchProcessor::default_config()
            .process(&[], MockOperation { should_fail: false }, false)
            .unwrap();
        assert_eq!(results.total_files(), 0);
        assert!(results.all_succeeded());
    }

    #[test]
    fn test_batch_processor_serial_with_failures() {
        let processor = BatchProcessor::new(BatchConfig {
            parallel_threshold: 100,
            ..Default::default()
        });
        let files = vec![PathBuf::from("a.cbf"), PathBuf::from("b.cbf")];
        let results = processor
            .process(&files, MockOperation { should_fail: true }, true)
            .unwrap();
        assert_eq!(results.failure_count(), 2);
        let err = results.failures().next().unwrap().result.as_ref().unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::Io);
    }

    #[test]
    fn test_batch_processor_parallel_keeps_order() {
        let processor = BatchProcessor::new(BatchConfig {
            parallel_threshold: 2,
            max_threads: Some(3),
            ..Default::default()
        });
        let files: Vec<PathBuf> = (0..20).map(|i| PathBuf::from(format!("f{}.cbf", i))).collect();
        let results = processor
            .process(&files, MockOperation { should_fail: false }, false)
            .unwrap();
        assert_eq!(results.success_count(), 20);
        for (file, result) in files.iter().zip(&results.results) {
            assert_eq!(&result.path, file);
        }
    }

    #[test]
    fn test_summary_missing_file() {
        let op = SummaryOperation::new(KeyQuery::all());
        let err = op.process_file(Path::new("/nonexistent/x.cbf")).unwrap_err();
        assert_eq!(err.kind, CbfErrorKind::Io);
    }
}
