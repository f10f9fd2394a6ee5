//! Measurement fixtures and a reference model for cross-checking results.

use crate::io::compression::auto_detect_writer;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Station names used by [`MeasurementsBuilder`]. Includes multi-byte UTF-8
/// and names that share prefixes so byte-wise ordering is exercised.
pub const STATIONS: &[&str] = &[
    "Abha",
    "Abidjan",
    "Accra",
    "Addis Ababa",
    "Bergen",
    "Berlin",
    "Bern",
    "Cape Town",
    "Hamburg",
    "İzmir",
    "Oslo",
    "Paris",
    "Petropavlovsk-Kamchatsky",
    "Reykjavík",
    "St. John's",
    "São Paulo",
    "Wrocław",
    "Zürich",
    "ab",
    "Ürümqi",
];

/// The small end-to-end sample.
pub const PARIS_OSLO: &str = "Paris;10.0\nParis;20.0\nOslo;-5.5\n";

/// Builder for deterministic measurement data.
///
/// Values are uniformly spread over `-99.9..=99.9` using a fixed-seed
/// generator, so the same settings always produce the same bytes.
///
/// # Example
///
/// ```
/// use ironbrc::testing::MeasurementsBuilder;
///
/// let data = MeasurementsBuilder::new().rows(3).stations(1).build();
/// assert_eq!(data.iter().filter(|&&b| b == b'\n').count(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct MeasurementsBuilder {
    rows: usize,
    stations: usize,
    seed: u64,
    trailing_newline: bool,
}

impl Default for MeasurementsBuilder {
    fn default() -> Self {
        Self { rows: 1_000, stations: STATIONS.len(), seed: 0x5eed, trailing_newline: true }
    }
}

impl MeasurementsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    /// Number of distinct keys to draw from, clamped to `1..=STATIONS.len()`.
    #[must_use]
    pub fn stations(mut self, stations: usize) -> Self {
        self.stations = stations.clamp(1, STATIONS.len());
        self
    }

    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Whether the last line ends with `\n` (default `true`).
    #[must_use]
    pub const fn trailing_newline(mut self, yes: bool) -> Self {
        self.trailing_newline = yes;
        self
    }

    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut state = self.seed;
        let mut out = Vec::with_capacity(self.rows * 16);
        for _ in 0..self.rows {
            let station = STATIONS[(next(&mut state) % self.stations as u64) as usize];
            let tenths = (next(&mut state) % 1999) as i64 - 999;
            out.extend_from_slice(station.as_bytes());
            out.push(b';');
            out.extend_from_slice(format_tenths(tenths).as_bytes());
            out.push(b'\n');
        }
        if !self.trailing_newline && out.last() == Some(&b'\n') {
            out.pop();
        }
        out
    }

    /// Write the data to `dir/name`, compressed according to the extension.
    ///
    /// # Errors
    /// Fails if the file cannot be created or written.
    pub fn write_to(&self, dir: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
        write_measurements(dir.as_ref().join(name), &self.build())
    }
}

/// Write raw measurement bytes to `path`, compressed according to its extension.
///
/// # Errors
/// Fails if the file cannot be created or written.
pub fn write_measurements(path: impl AsRef<Path>, data: &[u8]) -> Result<PathBuf> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = auto_detect_writer(f, path)?;
    w.write_all(data).with_context(|| format!("write {}", path.display()))?;
    w.flush()?;
    drop(w);
    Ok(path.to_path_buf())
}

/// Expected statistics for one key, with the sum kept exact in tenths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceStats {
    pub min_tenths: i64,
    pub max_tenths: i64,
    pub sum_tenths: i64,
    pub count: u64,
}

/// Compute expected statistics with a deliberately naive parser.
///
/// # Panics
/// Panics on input that is not UTF-8 or not in `key;value` form.
#[must_use]
pub fn reference_stats(data: &[u8]) -> BTreeMap<String, ReferenceStats> {
    let text = std::str::from_utf8(data).expect("fixture is UTF-8");
    let mut out: BTreeMap<String, ReferenceStats> = BTreeMap::new();
    for line in text.lines() {
        let (key, value) = line.split_once(';').expect("fixture line has a separator");
        let tenths = (value.parse::<f64>().expect("fixture value parses") * 10.0).round() as i64;
        out.entry(key.to_string())
            .and_modify(|s| {
                s.min_tenths = s.min_tenths.min(tenths);
                s.max_tenths = s.max_tenths.max(tenths);
                s.sum_tenths += tenths;
                s.count += 1;
            })
            .or_insert(ReferenceStats {
                min_tenths: tenths,
                max_tenths: tenths,
                sum_tenths: tenths,
                count: 1,
            });
    }
    out
}

fn format_tenths(tenths: i64) -> String {
    let sign = if tenths < 0 { "-" } else { "" };
    let abs = tenths.unsigned_abs();
    format!("{sign}{}.{}", abs / 10, abs % 10)
}

// splitmix64
fn next(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_is_deterministic() {
        let a = MeasurementsBuilder::new().rows(50).seed(1).build();
        let b = MeasurementsBuilder::new().rows(50).seed(1).build();
        let c = MeasurementsBuilder::new().rows(50).seed(2).build();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn trailing_newline_can_be_omitted() {
        let data = MeasurementsBuilder::new().rows(4).trailing_newline(false).build();
        assert_ne!(data.last(), Some(&b'\n'));
        assert_eq!(reference_stats(&data).values().map(|s| s.count).sum::<u64>(), 4);
    }

    #[test]
    fn tenths_format_has_one_fractional_digit() {
        assert_eq!(format_tenths(-5), "-0.5");
        assert_eq!(format_tenths(0), "0.0");
        assert_eq!(format_tenths(999), "99.9");
        assert_eq!(format_tenths(-123), "-12.3");
    }

    #[test]
    fn reference_of_sample() {
        let stats = reference_stats(PARIS_OSLO.as_bytes());
        assert_eq!(
            stats["Paris"],
            ReferenceStats { min_tenths: 100, max_tenths: 200, sum_tenths: 300, count: 2 }
        );
        assert_eq!(stats["Oslo"].count, 1);
    }
}
