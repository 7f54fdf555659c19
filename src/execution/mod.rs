//! Execution engine: applies a [`RecordSchema`] to a stream of records.
//!
//! The engine reads the stream in fixed-size chunks. Each chunk is transformed either in order on
//! the calling thread (`workers == 1`) or on a `rayon` pool, split into dispatch batches of
//! `dispatch_size` records. Results are merged back in record-index order, so the output of a
//! chunk is identical whatever the worker count. Chunks are handed to the [`Sink`] strictly in
//! stream order.
//!
//! A failing record never aborts the run: it is left out of the accepted rows and its
//! diagnostics are kept under its record index. Only orchestration faults (reader errors, sink
//! errors, a panicking worker) end the run with an [`IngestionError`].

mod observer;

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::Deserialize;

use crate::diagnostic::Diagnostics;
use crate::error::{IngestionError, IngestionResult};
use crate::schema::{RecordOutcome, RecordSchema};
use crate::sink::{MemorySink, Sink};
use crate::types::{DataSet, OutboundRecord, RawRecord};

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    TracingExecutionObserver,
};

/// Diagnostics keyed by zero-based record index.
pub type DiagnosticsMap = BTreeMap<usize, Diagnostics>;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Number of workers.
    ///
    /// `0` derives a default from the available parallelism, leaving one core for the
    /// coordinating thread. `1` runs strictly sequentially on the calling thread.
    pub workers: usize,
    /// Number of records buffered per chunk. Bounds memory use.
    pub chunk_size: usize,
    /// Number of records handed to a worker at a time.
    pub dispatch_size: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            chunk_size: 4_096,
            dispatch_size: 64,
        }
    }
}

impl ExecutionOptions {
    /// Sequential options with the default chunk size.
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            ..Self::default()
        }
    }

    /// The worker count actually used.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .saturating_sub(1)
            .max(1)
    }
}

/// Transformed output of one chunk, ready for a [`Sink`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutput {
    /// Index of the first record in the chunk.
    pub first_index: usize,
    /// Number of inbound records in the chunk.
    pub record_count: usize,
    /// Accepted records, in record-index order.
    pub records: Vec<OutboundRecord>,
    /// Record index of each entry in `records`.
    pub accepted_indices: Vec<usize>,
    /// Diagnostics of every record in the chunk that produced any.
    pub diagnostics: DiagnosticsMap,
}

impl ChunkOutput {
    pub fn rejected(&self) -> usize {
        self.record_count - self.records.len()
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub chunks: usize,
    /// Number of records with at least one diagnostic.
    pub records_with_diagnostics: usize,
}

/// In-memory result of [`ExecutionEngine::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionReport {
    /// Accepted records.
    pub dataset: DataSet,
    /// Diagnostics for every record that produced any, keyed by record index.
    pub diagnostics: DiagnosticsMap,
    pub summary: RunSummary,
}

/// Applies a [`RecordSchema`] to record streams with configurable parallelism.
pub struct ExecutionEngine {
    pool: Option<ThreadPool>,
    workers: usize,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Fails if `chunk_size` or `dispatch_size` is zero, or if the worker pool cannot be built.
    pub fn new(opts: ExecutionOptions) -> IngestionResult<Self> {
        if opts.chunk_size == 0 {
            return Err(IngestionError::definition("chunk_size must be > 0"));
        }
        if opts.dispatch_size == 0 {
            return Err(IngestionError::definition("dispatch_size must be > 0"));
        }

        let workers = opts.resolved_workers();
        let pool = if workers > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("record-ingest-{i}"))
                    .build()?,
            )
        } else {
            None
        };

        Ok(Self {
            pool,
            workers,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of workers in use.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.opts
    }

    /// Apply `schema` to an in-memory stream and collect the result.
    pub fn apply<I>(
        &self,
        schema: &RecordSchema,
        records: I,
        file_name: Option<&str>,
    ) -> IngestionResult<IngestionReport>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut sink = MemorySink::new(schema.table_schema());
        let summary = self.run(schema, records.into_iter().map(Ok), file_name, &mut sink)?;
        let (dataset, diagnostics) = sink.into_parts();
        Ok(IngestionReport {
            dataset,
            diagnostics,
            summary,
        })
    }

    /// Apply `schema` to a fallible record stream, flushing each chunk to `sink` in order.
    ///
    /// A reader error stops the run before the chunk it occurs in is processed; chunks already
    /// flushed stay flushed. [`Sink::finish`] is only called after a complete run.
    pub fn run<I, S>(
        &self,
        schema: &RecordSchema,
        records: I,
        file_name: Option<&str>,
        sink: &mut S,
    ) -> IngestionResult<RunSummary>
    where
        I: IntoIterator<Item = IngestionResult<RawRecord>>,
        S: Sink + ?Sized,
    {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted {
            workers: self.workers,
            chunk_size: self.opts.chunk_size,
        });

        let table = schema.table_schema();
        let mut summary = RunSummary::default();
        let mut records = records.into_iter();
        let mut buffer: Vec<RawRecord> = Vec::with_capacity(self.opts.chunk_size);

        loop {
            buffer.clear();
            for item in records.by_ref().take(self.opts.chunk_size) {
                match item {
                    Ok(record) => buffer.push(record),
                    Err(err) => {
                        tracing::error!(
                            record_index = summary.records + buffer.len(),
                            error = %err,
                            "reading records failed, aborting run"
                        );
                        return Err(err);
                    }
                }
            }
            if buffer.is_empty() {
                break;
            }

            let chunk = self.process_chunk(schema, summary.records, &buffer, file_name)?;
            sink.write_chunk(&table, &chunk)?;

            summary.records += chunk.record_count;
            summary.accepted += chunk.records.len();
            summary.rejected += chunk.rejected();
            summary.records_with_diagnostics += chunk.diagnostics.len();
            summary.chunks += 1;
        }

        sink.finish()?;

        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        self.emit(ExecutionEvent::RunFinished {
            elapsed,
            metrics: self.metrics.snapshot(),
        });
        Ok(summary)
    }

    /// Transform one chunk whose first record has index `first_index`.
    pub fn process_chunk(
        &self,
        schema: &RecordSchema,
        first_index: usize,
        records: &[RawRecord],
        file_name: Option<&str>,
    ) -> IngestionResult<ChunkOutput> {
        self.emit(ExecutionEvent::ChunkStarted {
            first_index,
            record_count: records.len(),
        });

        let apply = |index: usize, record: &RawRecord| {
            self.metrics.on_record_processed();
            schema.apply_record(index, record, file_name)
        };

        let end_index = first_index + records.len();
        let outcomes: Vec<RecordOutcome> = guard_workers(first_index, end_index, || match &self.pool {
            None => records
                .iter()
                .enumerate()
                .map(|(i, r)| apply(first_index + i, r))
                .collect(),
            Some(pool) => {
                let dispatch = self.opts.dispatch_size;
                pool.install(|| {
                    records
                        .par_chunks(dispatch)
                        .enumerate()
                        .map(|(batch, sub)| {
                            let base = first_index + batch * dispatch;
                            sub.iter()
                                .enumerate()
                                .map(|(j, r)| apply(base + j, r))
                                .collect::<Vec<_>>()
                        })
                        .collect::<Vec<_>>()
                })
                .into_iter()
                .flatten()
                .collect()
            }
        })?;

        let mut out = ChunkOutput {
            first_index,
            record_count: records.len(),
            records: Vec::with_capacity(outcomes.len()),
            accepted_indices: Vec::with_capacity(outcomes.len()),
            diagnostics: DiagnosticsMap::new(),
        };
        for outcome in outcomes {
            self.metrics
                .on_record_merged(outcome.success, &outcome.diagnostics);
            if outcome.success {
                out.accepted_indices.push(outcome.index);
                out.records.push(outcome.record);
            }
            if !outcome.diagnostics.is_empty() {
                out.diagnostics.insert(outcome.index, outcome.diagnostics);
            }
        }

        self.metrics.on_chunk_end();
        self.emit(ExecutionEvent::ChunkFinished {
            first_index,
            accepted: out.records.len(),
            rejected: out.rejected(),
        });
        Ok(out)
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

/// Run `work`, turning a panic that escaped the field boundary into a fatal run error.
///
/// `rayon` joins every outstanding job of the scope before re-raising a worker panic, so no
/// worker is still running when the error is returned.
fn guard_workers<T>(
    first_index: usize,
    end_index: usize,
    work: impl FnOnce() -> T,
) -> IngestionResult<T> {
    panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "worker panicked".to_string());
        tracing::error!(first_index, end_index, %message, "worker failure, aborting run");
        IngestionError::Worker {
            first_index,
            end_index,
            message,
        }
    })
}
