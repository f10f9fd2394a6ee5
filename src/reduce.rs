//! Merging partial results into the single [`GlobalResult`].
//!
//! The reducer is the only owner of the global map, so no locking is involved.
//! Because [`Accumulator::merge`] is commutative and associative, the order in
//! which partial results arrive does not change the outcome.

use crate::accumulator::{Accumulator, Summary};
use crate::aggregate::PartialResult;
use crate::lines::OwnedKey;
use crate::pool::PartialMessage;
use anyhow::Result;
use crossbeam_channel::Receiver;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use tracing::debug;

/// Per-key accumulators across all chunks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalResult {
    entries: FxHashMap<OwnedKey, Accumulator>,
    records: u64,
    partials: u64,
}

impl GlobalResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one partial result.
    ///
    /// Keys new to the global map adopt the partial's accumulator as is;
    /// known keys are combined field by field.
    pub fn merge(&mut self, partial: PartialResult) {
        self.records += partial.records;
        self.partials += 1;
        for (key, acc) in partial {
            match self.entries.entry(key) {
                Entry::Occupied(mut slot) => slot.get_mut().merge(&acc),
                Entry::Vacant(slot) => {
                    slot.insert(acc);
                }
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total lines folded into this result.
    #[must_use]
    pub const fn records(&self) -> u64 {
        self.records
    }

    /// Number of partial results merged.
    #[must_use]
    pub const fn partials(&self) -> u64 {
        self.partials
    }

    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&Accumulator> {
        self.entries.get(key)
    }

    /// Entries sorted by key, ascending byte-wise.
    #[must_use]
    pub fn sorted(&self) -> Vec<(&[u8], &Accumulator)> {
        let mut out: Vec<(&[u8], &Accumulator)> =
            self.entries.iter().map(|(k, a)| (&**k, a)).collect();
        out.sort_unstable_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Finished statistics sorted by key.
    #[must_use]
    pub fn summaries(&self) -> Vec<(&[u8], Summary)> {
        self.sorted().into_iter().map(|(k, a)| (k, a.finish())).collect()
    }
}

impl FromIterator<PartialResult> for GlobalResult {
    fn from_iter<I: IntoIterator<Item = PartialResult>>(iter: I) -> Self {
        let mut global = Self::new();
        for partial in iter {
            global.merge(partial);
        }
        global
    }
}

/// Drain the result queue into a [`GlobalResult`].
///
/// # Errors
/// Returns the first failed aggregation received; remaining messages are left
/// in the queue.
pub fn reduce(results: &Receiver<PartialMessage>) -> Result<GlobalResult> {
    let mut global = GlobalResult::new();
    for message in results {
        let partial = message?;
        debug!(keys = partial.len(), records = partial.records(), "merging partial result");
        global.merge(partial);
    }
    Ok(global)
}
