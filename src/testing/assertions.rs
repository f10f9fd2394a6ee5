//! Assertion functions for comparing aggregation results.
//!
//! Sums are accumulated in `f64`, so two runs that split the input differently
//! may disagree in the last bits of `sum`. These helpers compare `min`, `max`
//! and `count` exactly and `sum` within [`SUM_TOLERANCE`].

use super::fixtures::ReferenceStats;
use crate::accumulator::Accumulator;
use crate::reduce::GlobalResult;
use std::collections::BTreeMap;

/// Absolute tolerance for comparing sums of one-decimal values.
pub const SUM_TOLERANCE: f64 = 1e-6;

/// Assert that two results hold the same keys with equivalent statistics.
///
/// # Panics
///
/// Panics if the key sets differ or any accumulator differs beyond the sum
/// tolerance.
///
/// # Example
///
/// ```
/// use ironbrc::Runner;
/// use ironbrc::testing::{PARIS_OSLO, assert_same_result};
///
/// # fn main() -> anyhow::Result<()> {
/// let seq = Runner::sequential().run_reader(PARIS_OSLO.as_bytes())?;
/// let par = Runner::parallel(Some(2)).with_chunk_size(4).run_reader(PARIS_OSLO.as_bytes())?;
/// assert_same_result(&par, &seq);
/// # Ok(())
/// # }
/// ```
pub fn assert_same_result(actual: &GlobalResult, expected: &GlobalResult) {
    let actual_keys: Vec<_> = actual.sorted().into_iter().map(|(k, _)| lossy(k)).collect();
    let expected_keys: Vec<_> = expected.sorted().into_iter().map(|(k, _)| lossy(k)).collect();
    assert_eq!(
        actual_keys, expected_keys,
        "Key set mismatch:\n  Expected: {expected_keys:?}\n  Actual: {actual_keys:?}"
    );
    for (key, exp) in expected.sorted() {
        let act = actual.get(key).expect("key present after key-set check");
        assert_accumulator_eq(&lossy(key), act, exp);
    }
    assert_eq!(actual.records(), expected.records(), "Record count mismatch");
}

/// Assert that a result agrees with [`reference_stats`](super::reference_stats).
///
/// # Panics
///
/// Panics if the key sets differ or any statistic disagrees with the reference.
pub fn assert_matches_reference(actual: &GlobalResult, expected: &BTreeMap<String, ReferenceStats>) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Key count mismatch:\n  Expected: {:?}\n  Actual: {:?}",
        expected.keys().collect::<Vec<_>>(),
        actual.sorted().into_iter().map(|(k, _)| lossy(k)).collect::<Vec<_>>()
    );
    for (key, stats) in expected {
        let acc = actual
            .get(key.as_bytes())
            .unwrap_or_else(|| panic!("Missing key {key:?} in result"));
        let want = Accumulator {
            min: tenths(stats.min_tenths),
            max: tenths(stats.max_tenths),
            sum: tenths(stats.sum_tenths),
            count: stats.count,
        };
        assert_accumulator_eq(key, acc, &want);
    }
}

/// Assert that two accumulators agree, with `sum` compared within tolerance.
///
/// # Panics
///
/// Panics on any mismatch, naming `key` in the message.
pub fn assert_accumulator_eq(key: &str, actual: &Accumulator, expected: &Accumulator) {
    assert_eq!(actual.count, expected.count, "Count mismatch for {key:?}");
    assert!(
        (actual.min - expected.min).abs() < SUM_TOLERANCE,
        "Min mismatch for {key:?}:\n  Expected: {}\n  Actual: {}",
        expected.min,
        actual.min
    );
    assert!(
        (actual.max - expected.max).abs() < SUM_TOLERANCE,
        "Max mismatch for {key:?}:\n  Expected: {}\n  Actual: {}",
        expected.max,
        actual.max
    );
    let scale = expected.sum.abs().max(1.0);
    assert!(
        (actual.sum - expected.sum).abs() <= SUM_TOLERANCE * scale,
        "Sum mismatch for {key:?}:\n  Expected: {}\n  Actual: {}",
        expected.sum,
        actual.sum
    );
}

#[allow(clippy::cast_precision_loss)]
fn tenths(t: i64) -> f64 {
    t as f64 / 10.0
}

fn lossy(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}
