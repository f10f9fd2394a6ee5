//! Testing utilities for measurement aggregation.
//!
//! - **Fixtures**: deterministic measurement files of any size, plain or
//!   compressed, via [`MeasurementsBuilder`]
//! - **Reference model**: [`reference_stats`] computes the expected statistics
//!   with `str::parse` and a `BTreeMap`, independently of the pipeline
//! - **Assertions**: compare a [`GlobalResult`](crate::GlobalResult) with
//!   another result or with the reference model
//!
//! # Example
//!
//! ```
//! use ironbrc::Runner;
//! use ironbrc::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = MeasurementsBuilder::new().rows(500).stations(12).seed(7).build();
//! let result = Runner::sequential()
//!     .with_chunk_size(64)
//!     .run_reader(data.as_slice())?;
//!
//! assert_matches_reference(&result, &reference_stats(&data));
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
