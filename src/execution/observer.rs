use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::diagnostic::{Diagnostics, Severity};

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        workers: usize,
        chunk_size: usize,
    },
    ChunkStarted {
        first_index: usize,
        record_count: usize,
    },
    ChunkFinished {
        first_index: usize,
        accepted: usize,
        rejected: usize,
    },
    RunFinished {
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Forwards execution events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted {
                workers,
                chunk_size,
            } => tracing::info!(workers, chunk_size, "ingestion run started"),
            ExecutionEvent::ChunkStarted {
                first_index,
                record_count,
            } => tracing::debug!(first_index, record_count, "chunk started"),
            ExecutionEvent::ChunkFinished {
                first_index,
                accepted,
                rejected,
            } => tracing::debug!(first_index, accepted, rejected, "chunk finished"),
            ExecutionEvent::RunFinished { elapsed, metrics } => {
                tracing::info!(elapsed = ?elapsed, %metrics, "ingestion run finished")
            }
        }
    }
}

/// Real-time metrics for an execution run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    records_processed: AtomicU64,
    records_accepted: AtomicU64,
    records_rejected: AtomicU64,
    chunks_finished: AtomicU64,
    diagnostics: [AtomicU64; 4],
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            records_processed: AtomicU64::new(0),
            records_accepted: AtomicU64::new(0),
            records_rejected: AtomicU64::new(0),
            chunks_finished: AtomicU64::new(0),
            diagnostics: Default::default(),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);

        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.records_processed.store(0, Ordering::SeqCst);
        self.records_accepted.store(0, Ordering::SeqCst);
        self.records_rejected.store(0, Ordering::SeqCst);
        self.chunks_finished.store(0, Ordering::SeqCst);
        for counter in &self.diagnostics {
            counter.store(0, Ordering::SeqCst);
        }
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    /// Called from worker threads as each record is transformed.
    pub fn on_record_processed(&self) {
        let _ = self.records_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_record_merged(&self, accepted: bool, diagnostics: &Diagnostics) {
        let counter = if accepted {
            &self.records_accepted
        } else {
            &self.records_rejected
        };
        let _ = counter.fetch_add(1, Ordering::SeqCst);
        for d in diagnostics {
            let _ = self.diagnostics[severity_slot(d.severity())].fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn on_chunk_end(&self) {
        let _ = self.chunks_finished.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };
        let diag = |sev: Severity| self.diagnostics[severity_slot(sev)].load(Ordering::SeqCst);

        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            records_processed: self.records_processed.load(Ordering::SeqCst),
            records_accepted: self.records_accepted.load(Ordering::SeqCst),
            records_rejected: self.records_rejected.load(Ordering::SeqCst),
            chunks_finished: self.chunks_finished.load(Ordering::SeqCst),
            infos: diag(Severity::Info),
            warnings: diag(Severity::Warning),
            errors: diag(Severity::Error),
            internal_errors: diag(Severity::InternalError),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn severity_slot(severity: Severity) -> usize {
    match severity {
        Severity::Info => 0,
        Severity::Warning => 1,
        Severity::Error => 2,
        Severity::InternalError => 3,
    }
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub records_processed: u64,
    pub records_accepted: u64,
    pub records_rejected: u64,
    pub chunks_finished: u64,
    pub infos: u64,
    pub warnings: u64,
    pub errors: u64,
    pub internal_errors: u64,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, records={} (accepted={}, rejected={}), chunks={}, diagnostics=[info={}, warning={}, error={}, internal={}], elapsed={:?}",
            self.run_id,
            self.records_processed,
            self.records_accepted,
            self.records_rejected,
            self.chunks_finished,
            self.infos,
            self.warnings,
            self.errors,
            self.internal_errors,
            self.elapsed
        )
    }
}
