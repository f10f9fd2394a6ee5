//! Rendering a [`GlobalResult`] as the one-line summary.
//!
//! `{key1=min/mean/max, key2=min/mean/max, ...}`, keys ascending byte-wise,
//! every number with one decimal place. Keys that are not valid UTF-8 are
//! rendered lossily.

use crate::accumulator::Summary;
use crate::reduce::GlobalResult;
use std::fmt::{self, Display, Write};

struct Entry<'a>(&'a [u8], Summary);

impl Display for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Summary { min, mean, max } = self.1;
        write!(f, "{}={min:.1}/{mean:.1}/{max:.1}", String::from_utf8_lossy(self.0))
    }
}

impl Display for GlobalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('{')?;
        for (i, (key, summary)) in self.summaries().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            Entry(key, summary).fmt(f)?;
        }
        f.write_char('}')
    }
}

/// Render the summary line.
#[must_use]
pub fn format_summary(result: &GlobalResult) -> String {
    result.to_string()
}
