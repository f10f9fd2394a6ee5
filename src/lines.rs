//! Splitting a chunk of complete lines into `(key, value)` records.
//!
//! Keys are handed out as [`KeyView`]s: read-only spans into the chunk buffer
//! that cannot outlive it. Anything that needs to keep a key after the chunk is
//! dropped has to copy it with [`KeyView::to_owned_key`].

use crate::decode::{decode, decode_checked};
use anyhow::{Context, Result, anyhow};
use std::fmt;

/// Separator between key and value on every line.
pub const SEPARATOR: u8 = b';';

/// Owned key bytes, as stored in partial and global results.
pub type OwnedKey = Box<[u8]>;

/// How the numeric field of each line is decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Decoding {
    /// Fast path; malformed numbers produce unspecified values.
    #[default]
    Trusted,
    /// Validate every number and fail on the first malformed one.
    Strict,
}

/// Borrowed view of a key inside a chunk buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyView<'a>(&'a [u8]);

impl<'a> KeyView<'a> {
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// Copy the key out of the chunk so it can outlive it.
    #[must_use]
    pub fn to_owned_key(&self) -> OwnedKey {
        Box::from(self.0)
    }
}

impl fmt::Debug for KeyView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyView({:?})", String::from_utf8_lossy(self.0))
    }
}

/// One decoded line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Record<'a> {
    pub key: KeyView<'a>,
    pub value: f64,
}

/// Lazy iterator over the records of a span, in input order.
///
/// The end of the span terminates the last line, so a final line without a
/// trailing newline is still yielded. After the first error the iterator is
/// exhausted.
pub struct Lines<'a> {
    span: &'a [u8],
    pos: usize,
    decoding: Decoding,
}

/// Iterate the records of `span` with the trusted decoder.
#[must_use]
pub const fn lines(span: &[u8]) -> Lines<'_> {
    Lines::with_decoding(span, Decoding::Trusted)
}

impl<'a> Lines<'a> {
    #[must_use]
    pub const fn with_decoding(span: &'a [u8], decoding: Decoding) -> Self {
        Self { span, pos: 0, decoding }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let span = self.span;
        let start = self.pos;
        let rest = span.get(start..).filter(|r| !r.is_empty())?;

        let line_len = rest.iter().position(|&b| b == b'\n');
        let line = &rest[..line_len.unwrap_or(rest.len())];
        self.pos = start + line_len.map_or(rest.len(), |n| n + 1);

        let Some(sep) = line.iter().position(|&b| b == SEPARATOR) else {
            self.pos = span.len();
            return Some(Err(anyhow!(
                "malformed line at byte offset {start}: no '{}' separator in {:?}",
                SEPARATOR as char,
                String::from_utf8_lossy(line)
            )));
        };

        let (key, number) = (&line[..sep], &line[sep + 1..]);
        let value = match self.decoding {
            Decoding::Trusted => decode(number),
            Decoding::Strict => match decode_checked(number)
                .with_context(|| format!("malformed line at byte offset {start}"))
            {
                Ok(v) => v,
                Err(e) => {
                    self.pos = span.len();
                    return Some(Err(e));
                }
            },
        };

        Some(Ok(Record { key: KeyView(key), value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(span: &[u8]) -> Vec<(String, f64)> {
        lines(span)
            .map(|r| {
                let r = r.unwrap();
                (String::from_utf8_lossy(r.key.as_bytes()).into_owned(), r.value)
            })
            .collect()
    }

    #[test]
    fn splits_lines_in_order() {
        let got = collect(b"Paris;10.0\nOslo;-5.5\nParis;20.0\n");
        assert_eq!(
            got,
            vec![
                ("Paris".to_string(), 10.0),
                ("Oslo".to_string(), -5.5),
                ("Paris".to_string(), 20.0),
            ]
        );
    }

    #[test]
    fn empty_span_yields_nothing() {
        assert!(lines(b"").next().is_none());
    }

    #[test]
    fn unterminated_final_line_is_counted() {
        assert_eq!(collect(b"A;1.0\nB;2.5"), vec![("A".to_string(), 1.0), ("B".to_string(), 2.5)]);
    }

    #[test]
    fn splits_at_first_separator() {
        let mut it = lines(b"St. John's;3.4\n");
        let r = it.next().unwrap().unwrap();
        assert_eq!(r.key.as_bytes(), b"St. John's");
        assert_eq!(r.value, 3.4);
    }

    #[test]
    fn missing_separator_is_an_error_with_offset() {
        let mut it = lines(b"A;1.0\nbroken\nB;2.0\n");
        assert!(it.next().unwrap().is_ok());
        let err = it.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("byte offset 6"), "{err}");
        assert!(it.next().is_none());
    }

    #[test]
    fn strict_mode_rejects_bad_numbers() {
        let mut it = Lines::with_decoding(b"A;1.25\n", Decoding::Strict);
        let err = it.next().unwrap().unwrap_err();
        assert!(format!("{err:#}").contains("invalid measurement"));
        assert!(it.next().is_none());
    }

    #[test]
    fn owned_key_is_a_copy() {
        let buf = b"Hamburg;1.0\n".to_vec();
        let owned = {
            let r = lines(&buf).next().unwrap().unwrap();
            r.key.to_owned_key()
        };
        drop(buf);
        assert_eq!(&*owned, b"Hamburg");
    }
}
