//! Line-aligned chunking of a byte stream.
//!
//! [`ChunkReader`] reads the source front to back exactly once. Each chunk is a
//! block of `chunk_size` bytes (shorter only at end of input) extended up to and
//! including the next `\n`, so no line is ever split between two chunks and the
//! concatenation of all chunks is byte-for-byte the source.
//!
//! Only the last chunk may lack a trailing newline, when the source itself does
//! not end with one.

use crate::io::compression::auto_detect_reader;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::trace;

/// Default target block size (24 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 24 * 1024 * 1024;

const TAIL_BUFFER: usize = 64 * 1024;

/// An owned, line-aligned span of the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    index: u64,
    offset: u64,
    bytes: Vec<u8>,
}

impl Chunk {
    #[must_use]
    pub const fn new(index: u64, offset: u64, bytes: Vec<u8>) -> Self {
        Self { index, offset, bytes }
    }

    /// Position of this chunk in read order, starting at 0.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Byte offset of the first byte of this chunk in the (decompressed) source.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Iterator of line-aligned [`Chunk`]s over any reader.
///
/// A read error other than end of input is yielded once; the iterator is
/// exhausted afterwards.
pub struct ChunkReader<R> {
    inner: BufReader<R>,
    chunk_size: usize,
    next_index: u64,
    offset: u64,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Wrap `reader`. A `chunk_size` of zero is treated as one byte, which
    /// yields one chunk per line.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            inner: BufReader::with_capacity(TAIL_BUFFER, reader),
            chunk_size: chunk_size.max(1),
            next_index: 0,
            offset: 0,
            done: false,
        }
    }

    /// Total bytes handed out so far.
    #[must_use]
    pub const fn bytes_read(&self) -> u64 {
        self.offset
    }

    fn read_chunk(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::with_capacity(self.chunk_size.min(DEFAULT_CHUNK_SIZE) + 128);
        // read_to_end retries on Interrupted.
        (&mut self.inner).take(self.chunk_size as u64).read_to_end(&mut buf)?;
        if buf.is_empty() {
            return Ok(None);
        }
        if buf.last() != Some(&b'\n') {
            self.inner.read_until(b'\n', &mut buf)?;
        }
        Ok(Some(buf))
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let index = self.next_index;
        let offset = self.offset;
        match self.read_chunk() {
            Ok(Some(bytes)) => {
                trace!(index, offset, len = bytes.len(), "chunk read");
                self.next_index += 1;
                self.offset += bytes.len() as u64;
                Some(Ok(Chunk::new(index, offset, bytes)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                let err = Err::<Chunk, _>(e);
                Some(err.with_context(|| format!("read chunk #{index} at byte offset {offset}")))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for ChunkReader<R> {}

/// Open a measurement file, transparently decompressing it when its extension
/// or leading bytes identify a known codec.
///
/// # Errors
/// Fails if the file cannot be opened or its decompressor cannot be set up.
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    auto_detect_reader(f, path).with_context(|| format!("setup decompression for {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunks(src: &[u8], size: usize) -> Vec<Vec<u8>> {
        ChunkReader::new(Cursor::new(src.to_vec()), size)
            .map(|c| c.unwrap().into_bytes())
            .collect()
    }

    #[test]
    fn chunks_are_line_aligned_and_complete() {
        let src = b"a;1.0\nbb;2.0\nccc;3.0\ndddd;4.0\n";
        for size in [0, 1, 3, 6, 7, 13, src.len(), src.len() + 10] {
            let parts = chunks(src, size);
            assert!(parts.iter().all(|c| c.last() == Some(&b'\n')), "size {size}");
            assert_eq!(parts.concat(), src.to_vec(), "size {size}");
        }
    }

    #[test]
    fn tiny_chunk_size_gives_one_line_per_chunk() {
        let parts = chunks(b"x;1.0\ny;2.0\n", 1);
        assert_eq!(parts, vec![b"x;1.0\n".to_vec(), b"y;2.0\n".to_vec()]);
    }

    #[test]
    fn block_ending_on_newline_is_not_extended() {
        let parts = chunks(b"x;1.0\ny;2.0\n", 6);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], b"x;1.0\n".to_vec());
    }

    #[test]
    fn huge_chunk_size_reads_whole_source() {
        let parts = chunks(b"x;1.0\ny;2.0\n", usize::MAX);
        assert_eq!(parts, vec![b"x;1.0\ny;2.0\n".to_vec()]);
    }

    #[test]
    fn empty_source_has_no_chunks() {
        assert!(chunks(b"", 16).is_empty());
    }

    #[test]
    fn unterminated_tail_stays_in_last_chunk() {
        let parts = chunks(b"x;1.0\ny;2.0", 4);
        assert_eq!(parts.concat(), b"x;1.0\ny;2.0".to_vec());
        assert_eq!(parts.last().unwrap(), &b"y;2.0".to_vec());
    }

    #[test]
    fn indices_and_offsets_track_position() {
        let mut reader = ChunkReader::new(Cursor::new(b"a;1.0\nb;2.0\nc;3.0\n".to_vec()), 1);
        let all: Vec<Chunk> = reader.by_ref().collect::<Result<_>>().unwrap();
        let pos: Vec<(u64, u64)> = all.iter().map(|c| (c.index(), c.offset())).collect();
        assert_eq!(pos, vec![(0, 0), (1, 6), (2, 12)]);
        assert_eq!(reader.bytes_read(), 18);
    }

    struct FailAfter {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailAfter {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(std::io::Error::other("disk gone")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn read_error_is_reported_once() {
        let mut reader = ChunkReader::new(FailAfter { data: Cursor::new(b"a;1.0\n".to_vec()) }, 64);
        let err = reader.next().unwrap().unwrap_err();
        assert!(format!("{err:#}").contains("disk gone"));
        assert!(reader.next().is_none());
    }
}
