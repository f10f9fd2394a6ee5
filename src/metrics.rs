//! Run statistics for an aggregation.
//!
//! A [`RunMetrics`] handle is cheap to clone and safe to share between the
//! reader, the worker pool and the reducer. Attach one to a
//! [`Runner`](crate::Runner) and inspect it after the run:
//!
//! ```no_run
//! use ironbrc::Runner;
//! use ironbrc::metrics::RunMetrics;
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = RunMetrics::new();
//! let result = Runner::default()
//!     .with_metrics(metrics.clone())
//!     .run_path("measurements.txt")?;
//!
//! metrics.print();
//! metrics.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

/// Shared counters and phase timestamps for one run.
#[derive(Clone, Debug, Default)]
pub struct RunMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    chunks_read: AtomicU64,
    bytes_read: AtomicU64,
    partials_merged: AtomicU64,
    records: AtomicU64,
    keys: AtomicU64,
    phases: Mutex<Phases>,
}

#[derive(Debug, Default)]
struct Phases {
    start: Option<Instant>,
    read_finished: Option<Instant>,
    merge_finished: Option<Instant>,
}

/// Point-in-time copy of a [`RunMetrics`], serializable to JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub partials_merged: u64,
    pub records: u64,
    pub keys: u64,
    /// Milliseconds from start until the reader reached end of input.
    pub read_ms: Option<u64>,
    /// Milliseconds from start until the last partial result was merged.
    pub total_ms: Option<u64>,
}

impl RunMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&self) {
        self.phases().start = Some(Instant::now());
    }

    pub fn record_chunk(&self) {
        self.inner.chunks_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark end of input; `bytes` is the total the reader handed out.
    pub fn record_read_finished(&self, bytes: u64) {
        self.inner.bytes_read.store(bytes, Ordering::Relaxed);
        self.phases().read_finished = Some(Instant::now());
    }

    pub fn record_merge_finished(&self, partials: u64, records: u64, keys: usize) {
        self.inner.partials_merged.store(partials, Ordering::Relaxed);
        self.inner.records.store(records, Ordering::Relaxed);
        self.inner.keys.store(keys as u64, Ordering::Relaxed);
        self.phases().merge_finished = Some(Instant::now());
    }

    /// Time from start until the merge finished, if both were recorded.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let phases = self.phases();
        Some(phases.merge_finished?.duration_since(phases.start?))
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsReport {
        let since_start = |at: Option<Instant>, start: Option<Instant>| {
            u64::try_from(at?.duration_since(start?).as_millis()).ok()
        };
        let phases = self.phases();
        MetricsReport {
            chunks_read: self.inner.chunks_read.load(Ordering::Relaxed),
            bytes_read: self.inner.bytes_read.load(Ordering::Relaxed),
            partials_merged: self.inner.partials_merged.load(Ordering::Relaxed),
            records: self.inner.records.load(Ordering::Relaxed),
            keys: self.inner.keys.load(Ordering::Relaxed),
            read_ms: since_start(phases.read_finished, phases.start),
            total_ms: since_start(phases.merge_finished, phases.start),
        }
    }

    /// Emit the report as one structured `info` event.
    pub fn log(&self) {
        let r = self.snapshot();
        info!(
            chunks = r.chunks_read,
            bytes = r.bytes_read,
            partials = r.partials_merged,
            records = r.records,
            keys = r.keys,
            read_ms = ?r.read_ms,
            total_ms = ?r.total_ms,
            "run metrics"
        );
    }

    /// Print the report to stdout in a human-readable format.
    pub fn print(&self) {
        let r = self.snapshot();
        println!("\n============ Run Metrics =============");
        if let Some(ms) = r.total_ms {
            println!("Execution Time: {:.3}s ({ms} ms)", ms as f64 / 1000.0);
            println!("--------------------------------------");
        }
        println!("chunks_read: {}", r.chunks_read);
        println!("bytes_read: {}", r.bytes_read);
        println!("partials_merged: {}", r.partials_merged);
        println!("records: {}", r.records);
        println!("keys: {}", r.keys);
        if let Some(ms) = r.read_ms {
            println!("read_ms: {ms}");
        }
        println!("======================================\n");
    }

    /// Save the report as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.snapshot())?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    fn phases(&self) -> std::sync::MutexGuard<'_, Phases> {
        // Phases hold plain timestamps, a poisoned lock still has usable data.
        self.inner.phases.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_clones() {
        let m = RunMetrics::new();
        let shared = m.clone();
        m.record_start();
        shared.record_chunk();
        shared.record_chunk();
        m.record_read_finished(42);
        m.record_merge_finished(2, 7, 3);

        let r = m.snapshot();
        assert_eq!(r.chunks_read, 2);
        assert_eq!(r.bytes_read, 42);
        assert_eq!(r.partials_merged, 2);
        assert_eq!(r.records, 7);
        assert_eq!(r.keys, 3);
        assert!(r.read_ms.is_some());
        assert!(m.elapsed().is_some());
    }

    #[test]
    fn timings_absent_without_start() {
        let m = RunMetrics::new();
        m.record_merge_finished(0, 0, 0);
        assert_eq!(m.snapshot().total_ms, None);
        assert!(m.elapsed().is_none());
    }

    #[test]
    fn saves_json() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("metrics.json");
        let m = RunMetrics::new();
        m.record_chunk();
        m.record_read_finished(5);
        m.save_to_file(&path)?;

        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(v["chunks_read"], 1);
        assert_eq!(v["bytes_read"], 5);
        assert!(v["total_ms"].is_null());
        Ok(())
    }
}
