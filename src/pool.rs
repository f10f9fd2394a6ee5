//! Concurrent chunk aggregation.
//!
//! One aggregation task is spawned per chunk as chunks are dequeued. Tasks run
//! on a dedicated `rayon` pool and never share state: each owns its chunk and
//! sends its [`PartialResult`] down the result queue. The bounded chunk queue
//! throttles the reader when aggregation falls behind.

use crate::aggregate::{PartialResult, aggregate_with};
use crate::io::chunks::Chunk;
use crate::lines::Decoding;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::debug;

/// Item travelling on the result queue.
pub type PartialMessage = Result<PartialResult>;

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `threads` workers, or one per available CPU.
    ///
    /// # Errors
    /// Fails if the operating system refuses to spawn the worker threads.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let threads = threads.unwrap_or_else(num_cpus::get).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ironbrc-worker-{i}"))
            .build()
            .context("build aggregation thread pool")?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Drain `chunks` until it is closed, aggregating each chunk on the pool.
    ///
    /// Returns the number of chunks dispatched. `results` is consumed and
    /// dropped only once every spawned task has finished, so the receiving side
    /// sees the queue close exactly after the last partial result. `chunks` is
    /// consumed too: once `run` returns or unwinds, senders see a closed queue.
    ///
    /// At most two tasks per worker are in flight; beyond that the dispatcher
    /// stops dequeuing, so chunks back up in the bounded queue instead of in
    /// the pool.
    pub fn run(
        &self,
        chunks: Receiver<Chunk>,
        results: Sender<PartialMessage>,
        decoding: Decoding,
    ) -> u64 {
        let mut dispatched = 0u64;
        let (permit_tx, permit_rx) = bounded::<()>(self.threads() * 2);

        // The scope does not return until all spawned tasks are done.
        self.pool.in_place_scope(|scope| {
            for chunk in &chunks {
                if permit_tx.send(()).is_err() {
                    break;
                }
                let tx = results.clone();
                let permits = permit_rx.clone();
                dispatched += 1;
                scope.spawn(move |_| {
                    let index = chunk.index();
                    let partial = aggregate_with(&chunk, decoding);
                    drop(chunk);
                    // A closed queue means the reducer already bailed out.
                    if tx.send(partial).is_err() {
                        debug!(index, "result queue closed, dropping partial result");
                    }
                    let _ = permits.recv();
                });
            }
        });

        drop(results);
        debug!(dispatched, "worker pool drained");
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_chunk_yields_one_partial_then_queue_closes() -> Result<()> {
        let pool = WorkerPool::new(Some(2))?;
        let (chunk_tx, chunk_rx) = bounded(2);
        let (result_tx, result_rx) = bounded(2);

        let collected = std::thread::scope(|s| {
            let collector = s.spawn(|| result_rx.iter().collect::<Vec<_>>());
            let dispatcher = s.spawn(|| pool.run(chunk_rx, result_tx, Decoding::Trusted));
            for i in 0..10u64 {
                let line = format!("k{};{}.5\n", i % 3, i);
                chunk_tx.send(Chunk::new(i, 0, line.into_bytes())).unwrap();
            }
            drop(chunk_tx);
            assert_eq!(dispatcher.join().unwrap(), 10);
            collector.join().unwrap()
        });

        assert_eq!(collected.len(), 10);
        let records: u64 = collected.iter().map(|p| p.as_ref().unwrap().records()).sum();
        assert_eq!(records, 10);
        Ok(())
    }

    #[test]
    fn single_thread_pool_still_finishes() -> Result<()> {
        let pool = WorkerPool::new(Some(1))?;
        assert_eq!(pool.threads(), 1);
        let (chunk_tx, chunk_rx) = bounded(1);
        let (result_tx, result_rx) = bounded(1);

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..5u64 {
                    chunk_tx.send(Chunk::new(i, 0, b"a;1.0\n".to_vec())).unwrap();
                }
                drop(chunk_tx);
            });
            s.spawn(|| pool.run(chunk_rx, result_tx, Decoding::Trusted));
            assert_eq!(result_rx.iter().count(), 5);
        });
        Ok(())
    }
}
