//! # ironbrc
//!
//! Parallel chunked aggregation of `key;value` measurement files into per-key
//! **min / mean / max** statistics.
//!
//! Every input line has the form `<key>;<value>\n` where `<value>` is a signed
//! decimal with exactly one fractional digit. The output is a single line:
//!
//! ```text
//! {Oslo=-5.5/-5.5/-5.5, Paris=10.0/15.0/20.0}
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use ironbrc::Runner;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let result = Runner::default().run_path("measurements.txt")?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! 1. [`ChunkReader`] streams the source in large blocks, extending each block
//!    to the next newline so no line is split.
//! 2. The [`WorkerPool`](pool::WorkerPool) aggregates every chunk on its own
//!    task into a [`PartialResult`], parsing values with the allocation-free
//!    [`decode`](decode::decode).
//! 3. A single reducer folds partial results into the [`GlobalResult`] with a
//!    commutative, associative merge, so completion order is irrelevant.
//! 4. `GlobalResult`'s `Display` renders the sorted summary.
//!
//! Choose between the pipeline and a single-threaded loop with [`ExecMode`];
//! both produce the same result.
//!
//! ## Input policy
//!
//! - A final line without a trailing newline is counted.
//! - A line without a `;` separator fails the run.
//! - Numbers are trusted by default; [`Runner::strict`] validates them.
//! - Gzip, zstd, bzip2 and xz sources are decompressed transparently
//!   (features `compression-*`).
//!
//! ## Feature Flags
//!
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//!   `compression-xz` - codecs for compressed sources
//! - `metrics` - [`metrics::RunMetrics`] run statistics

pub mod accumulator;
pub mod aggregate;
pub mod decode;
pub mod format;
pub mod io;
pub mod lines;
pub mod pool;
pub mod reduce;
pub mod runner;
pub mod testing;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use accumulator::{Accumulator, Summary};
pub use aggregate::{PartialResult, aggregate, aggregate_with};
pub use format::format_summary;
pub use io::chunks::{Chunk, ChunkReader, open_source};
pub use lines::{Decoding, KeyView, Record, lines};
pub use reduce::{GlobalResult, reduce};
pub use runner::{ExecMode, Runner};
