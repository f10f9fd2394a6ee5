//! Per-key running statistics: `min`, `max`, `sum`, `count`.
//!
//! An [`Accumulator`] is created from its first observation, so it never
//! represents an empty group. [`Accumulator::merge`] is commutative and
//! associative, which lets chunks be aggregated in any order and combined later.

/// Running statistics for one key.
///
/// Invariant: `min <= v <= max` for every observed `v`, and `count >= 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Accumulator {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl Accumulator {
    /// Start an accumulator from its first observed value.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self { min: value, max: value, sum: value, count: 1 }
    }

    /// Fold one more observation in.
    #[inline]
    pub fn add_input(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    /// Combine another accumulator for the same key into this one.
    #[inline]
    pub fn merge(&mut self, other: &Self) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    #[must_use]
    pub fn finish(&self) -> Summary {
        Summary { min: self.min, mean: self.mean(), max: self.max }
    }
}

/// Finished `min/mean/max` triple for one key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}
