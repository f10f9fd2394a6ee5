//! Fixed-format decimal decoding for measurement values.
//!
//! Measurement values are ASCII decimals with an optional leading `-` and
//! exactly one fractional digit (`-12.3`, `0.0`, `5.7`). [`decode`] turns such a
//! span into an `f64` without going through `str::parse`, which would need a
//! UTF-8 check and a general-purpose float parser for every line.
//!
//! [`decode`] does **not** validate its input. A span with more than one
//! fractional digit, no decimal point, or no digits at all produces an
//! unspecified (but finite, non-panicking) value. Use [`decode_checked`] when
//! the input is not trusted.

use anyhow::{Result, bail};

/// Decode a signed one-fractional-digit decimal.
///
/// Precondition: `span` matches `-?[0-9]+\.[0-9]`. This is not checked.
///
/// # Example
/// ```
/// use ironbrc::decode::decode;
///
/// assert_eq!(decode(b"-12.3"), -12.3);
/// assert_eq!(decode(b"5.7"), 5.7);
/// ```
#[inline]
#[must_use]
pub fn decode(span: &[u8]) -> f64 {
    let (negative, digits) = match span.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, span),
    };

    let mut int_part: u64 = 0;
    let mut frac_digit: u64 = 0;
    let mut iter = digits.iter();
    for &b in iter.by_ref() {
        if b == b'.' {
            break;
        }
        int_part = int_part.wrapping_mul(10).wrapping_add(u64::from(b.wrapping_sub(b'0')));
    }
    if let Some(&b) = iter.next() {
        frac_digit = u64::from(b.wrapping_sub(b'0'));
    }

    // Integer tenths divided once keeps the result the nearest f64 to the decimal.
    #[allow(clippy::cast_precision_loss)]
    let magnitude = int_part.wrapping_mul(10).wrapping_add(frac_digit) as f64 / 10.0;
    if negative { -magnitude } else { magnitude }
}

/// Decode with full validation of the `-?[0-9]+\.[0-9]` grammar.
///
/// # Errors
/// Returns an error naming the offending text if `span` does not match the
/// grammar exactly.
pub fn decode_checked(span: &[u8]) -> Result<f64> {
    let digits = span.strip_prefix(b"-").unwrap_or(span);
    let valid = match digits {
        [int @ .., b'.', frac] => {
            !int.is_empty() && int.iter().all(u8::is_ascii_digit) && frac.is_ascii_digit()
        }
        _ => false,
    };
    if !valid {
        bail!(
            "invalid measurement {:?}: expected digits with exactly one fractional digit",
            String::from_utf8_lossy(span)
        );
    }
    Ok(decode(span))
}
