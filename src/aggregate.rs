//! Folding one chunk into a [`PartialResult`].

use crate::accumulator::Accumulator;
use crate::io::chunks::Chunk;
use crate::lines::{Decoding, KeyView, Lines, OwnedKey};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;

/// Per-key accumulators for exactly one chunk.
///
/// Keys are owned, so a partial result can be moved across threads after its
/// chunk has been dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialResult {
    pub(crate) entries: FxHashMap<OwnedKey, Accumulator>,
    pub(crate) records: u64,
}

impl PartialResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lines folded into this result.
    #[must_use]
    pub const fn records(&self) -> u64 {
        self.records
    }

    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&Accumulator> {
        self.entries.get(key)
    }
}

impl IntoIterator for PartialResult {
    type Item = (OwnedKey, Accumulator);
    type IntoIter = std::collections::hash_map::IntoIter<OwnedKey, Accumulator>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Aggregate a chunk with the trusted decoder.
///
/// # Errors
/// Fails if a line has no separator.
pub fn aggregate(chunk: &Chunk) -> Result<PartialResult> {
    aggregate_with(chunk, Decoding::Trusted)
}

/// Aggregate a chunk, decoding values as requested.
///
/// # Errors
/// Fails on the first malformed line; the error names the chunk and its
/// byte offset in the source.
pub fn aggregate_with(chunk: &Chunk, decoding: Decoding) -> Result<PartialResult> {
    aggregate_span(chunk.as_bytes(), decoding)
        .with_context(|| format!("chunk #{} at source offset {}", chunk.index(), chunk.offset()))
}

/// Aggregate raw bytes of complete lines.
///
/// Keys stay borrowed from `span` while folding and are copied once per
/// distinct key when the local map is turned into a [`PartialResult`].
///
/// # Errors
/// Fails on the first malformed line.
pub fn aggregate_span(span: &[u8], decoding: Decoding) -> Result<PartialResult> {
    let mut local: FxHashMap<KeyView<'_>, Accumulator> = FxHashMap::default();
    let mut records = 0u64;

    for record in Lines::with_decoding(span, decoding) {
        let record = record?;
        local
            .entry(record.key)
            .and_modify(|acc| acc.add_input(record.value))
            .or_insert_with(|| Accumulator::new(record.value));
        records += 1;
    }

    let entries = local
        .into_iter()
        .map(|(key, acc)| (key.to_owned_key(), acc))
        .collect();
    Ok(PartialResult { entries, records })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_repeated_keys() -> Result<()> {
        let partial = aggregate_span(
            b"Hamburg;12.0\nOslo;1.0\nHamburg;-3.5\nHamburg;8.2\n",
            Decoding::Trusted,
        )?;
        assert_eq!(partial.len(), 2);
        assert_eq!(partial.records(), 4);

        let hamburg = partial.get(b"Hamburg").unwrap();
        assert_eq!(hamburg.min, -3.5);
        assert_eq!(hamburg.max, 12.0);
        assert_eq!(hamburg.count, 3);
        assert_eq!(partial.get(b"Oslo").unwrap().count, 1);
        Ok(())
    }

    #[test]
    fn empty_span_gives_empty_partial() -> Result<()> {
        let partial = aggregate_span(b"", Decoding::Trusted)?;
        assert!(partial.is_empty());
        assert_eq!(partial.records(), 0);
        Ok(())
    }

    #[test]
    fn error_names_chunk() {
        let chunk = Chunk::new(3, 120, b"ok;1.0\nnot a record\n".to_vec());
        let err = aggregate(&chunk).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("chunk #3 at source offset 120"), "{msg}");
        assert!(msg.contains("byte offset 7"), "{msg}");
    }
}
