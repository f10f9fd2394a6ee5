//! Wiring the stages into a complete run.
//!
//! In [`ExecMode::Parallel`] the run is a three-stage pipeline:
//!
//! ```text
//! ChunkReader ──(bounded chunk queue)──▶ WorkerPool ──(bounded result queue)──▶ reduce
//! calling thread                         scoped thread + rayon pool             scoped thread
//! ```
//!
//! [`ExecMode::Sequential`] reads, aggregates and merges one chunk at a time on
//! the calling thread. Both modes produce the same [`GlobalResult`].

use crate::aggregate::aggregate_with;
use crate::io::chunks::{Chunk, ChunkReader, DEFAULT_CHUNK_SIZE, open_source};
use crate::lines::Decoding;
use crate::pool::{PartialMessage, WorkerPool};
use crate::reduce::{GlobalResult, reduce};
use anyhow::Result;
use crossbeam_channel::{Sender, bounded};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

#[cfg(feature = "metrics")]
use crate::metrics::RunMetrics;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    Parallel { threads: Option<usize> },
}

#[derive(Clone, Debug)]
pub struct Runner {
    pub mode: ExecMode,
    /// Target block size before extending to the next newline.
    pub chunk_size: usize,
    /// Capacity of the chunk queue between the reader and the pool.
    pub chunk_queue: usize,
    /// Capacity of the result queue between the pool and the reducer.
    pub result_queue: usize,
    pub decoding: Decoding,
    #[cfg(feature = "metrics")]
    metrics: Option<RunMetrics>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::Parallel { threads: None },
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_queue: 64,
            result_queue: 64,
            decoding: Decoding::Trusted,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }
}

impl Runner {
    #[must_use]
    pub fn sequential() -> Self {
        Self { mode: ExecMode::Sequential, ..Self::default() }
    }

    #[must_use]
    pub fn parallel(threads: Option<usize>) -> Self {
        Self { mode: ExecMode::Parallel { threads }, ..Self::default() }
    }

    #[must_use]
    pub const fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_queue_capacity(mut self, chunks: usize, results: usize) -> Self {
        self.chunk_queue = chunks;
        self.result_queue = results;
        self
    }

    /// Validate every number instead of trusting the input format.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.decoding = if strict { Decoding::Strict } else { Decoding::Trusted };
        self
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics(mut self, metrics: RunMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Aggregate the file at `path`, decompressing it if needed.
    ///
    /// # Errors
    /// Fails if the file cannot be opened, on any read error, and on the first
    /// malformed line.
    pub fn run_path(&self, path: impl AsRef<Path>) -> Result<GlobalResult> {
        let source = open_source(&path)?;
        info!(path = %path.as_ref().display(), "aggregating");
        self.run_reader(source)
    }

    /// Aggregate everything `reader` yields.
    ///
    /// # Errors
    /// Fails on any read error and on the first malformed line. No partial
    /// result is returned in either case.
    pub fn run_reader<R: Read>(&self, reader: R) -> Result<GlobalResult> {
        let started = Instant::now();
        #[cfg(feature = "metrics")]
        self.on_metrics(RunMetrics::record_start);

        let global = match self.mode {
            ExecMode::Sequential => self.run_sequential(reader)?,
            ExecMode::Parallel { threads } => self.run_parallel(reader, threads)?,
        };

        #[cfg(feature = "metrics")]
        self.on_metrics(|m| {
            m.record_merge_finished(global.partials(), global.records(), global.len());
        });
        info!(
            mode = ?self.mode,
            keys = global.len(),
            records = global.records(),
            chunks = global.partials(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregation finished"
        );
        Ok(global)
    }

    fn run_sequential<R: Read>(&self, reader: R) -> Result<GlobalResult> {
        let mut global = GlobalResult::new();
        let mut source = ChunkReader::new(reader, self.chunk_size);
        for chunk in source.by_ref() {
            let chunk = chunk?;
            #[cfg(feature = "metrics")]
            self.on_metrics(RunMetrics::record_chunk);
            global.merge(aggregate_with(&chunk, self.decoding)?);
        }
        debug!(bytes = source.bytes_read(), "input exhausted");
        #[cfg(feature = "metrics")]
        self.on_metrics(|m| m.record_read_finished(source.bytes_read()));
        Ok(global)
    }

    fn run_parallel<R: Read>(&self, reader: R, threads: Option<usize>) -> Result<GlobalResult> {
        let pool = WorkerPool::new(threads)?;
        debug!(threads = pool.threads(), chunk_size = self.chunk_size, "starting pipeline");

        let (chunk_tx, chunk_rx) = bounded::<Chunk>(self.chunk_queue.max(1));
        let (result_tx, result_rx) = bounded::<PartialMessage>(self.result_queue.max(1));
        let abort = AtomicBool::new(false);
        let decoding = self.decoding;

        thread::scope(|s| {
            // The dispatcher owns the chunk receiver, so if it exits early the
            // queue closes and a reader blocked on a full queue wakes up.
            let dispatcher = s.spawn(move || pool.run(chunk_rx, result_tx, decoding));

            let abort_flag = &abort;
            let reducer = s.spawn(move || {
                // Owning the receiver here means a failed reduce closes the queue,
                // which unblocks any task still trying to send.
                let merged = reduce(&result_rx);
                if merged.is_err() {
                    abort_flag.store(true, Ordering::Relaxed);
                }
                merged
            });

            let fed = self.feed(reader, chunk_tx, &abort);

            let dispatched = dispatcher.join().unwrap_or_else(|e| std::panic::resume_unwind(e));
            let merged = reducer.join().unwrap_or_else(|e| std::panic::resume_unwind(e));
            debug!(dispatched, "pipeline joined");

            // A merge error is the root cause when both stages failed.
            let global = merged?;
            fed?;
            Ok(global)
        })
    }

    /// Reader stage: push chunks until end of input, a read error, or abort.
    /// Dropping `chunks` on return closes the queue for the pool.
    fn feed<R: Read>(&self, reader: R, chunks: Sender<Chunk>, abort: &AtomicBool) -> Result<()> {
        let mut source = ChunkReader::new(reader, self.chunk_size);
        for chunk in source.by_ref() {
            if abort.load(Ordering::Relaxed) {
                debug!("reducer failed, stopping reader");
                break;
            }
            let chunk = chunk?;
            #[cfg(feature = "metrics")]
            self.on_metrics(RunMetrics::record_chunk);
            if chunks.send(chunk).is_err() {
                break;
            }
        }
        debug!(bytes = source.bytes_read(), "input exhausted");
        #[cfg(feature = "metrics")]
        self.on_metrics(|m| m.record_read_finished(source.bytes_read()));
        Ok(())
    }

    #[cfg(feature = "metrics")]
    fn on_metrics(&self, f: impl FnOnce(&RunMetrics)) {
        if let Some(m) = &self.metrics {
            f(m);
        }
    }
}
