//! Sequential access to the decoded stream.
//!
//! - [`BlockIterator`] yields every decoded block in order
//! - [`DecodedCursor`] exposes the decoded stream as `Read + Seek`

use std::io::{self, Read, Seek, SeekFrom};

use super::codec::compression::BlockCodec;
use super::reader::ArchiveReader;
use super::types::error::Result;

/// Iterator over decoded blocks.
///
/// Created by [`ArchiveReader::blocks()`].
pub struct BlockIterator<'a, R, C> {
    reader: &'a ArchiveReader<R, C>,
    next_block: usize,
}

impl<'a, R: Read + Seek, C: BlockCodec> BlockIterator<'a, R, C> {
    pub(super) fn new(reader: &'a ArchiveReader<R, C>) -> Self {
        Self { reader, next_block: 0 }
    }
}

impl<R: Read + Seek, C: BlockCodec> Iterator for BlockIterator<'_, R, C> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_block >= self.reader.num_blocks() {
            return None;
        }
        let block = self.reader.read_block(self.next_block);
        self.next_block += 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.reader.num_blocks().saturating_sub(self.next_block);
        (remaining, Some(remaining))
    }
}

/// A `Read + Seek` view over the decoded stream.
///
/// Each `read` call is served from at most one block, so sequential reads
/// hit the reader's block cache.
///
/// Created by [`ArchiveReader::cursor()`].
pub struct DecodedCursor<'a, R, C> {
    reader: &'a ArchiveReader<R, C>,
    position: u64,
}

impl<'a, R: Read + Seek, C: BlockCodec> DecodedCursor<'a, R, C> {
    pub(super) fn new(reader: &'a ArchiveReader<R, C>) -> Self {
        Self { reader, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read + Seek, C: BlockCodec> Read for DecodedCursor<'_, R, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let total = self.reader.total_len();
        if buf.is_empty() || self.position >= total {
            return Ok(0);
        }

        let block_size = u64::from(self.reader.block_size());
        let block_end = (self.position / block_size + 1) * block_size;
        let length = (buf.len() as u64).min(total - self.position).min(block_end - self.position);

        let bytes = self.reader.read_range(self.position, length)?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        self.position += bytes.len() as u64;
        Ok(bytes.len())
    }
}

impl<R: Read + Seek, C: BlockCodec> Seek for DecodedCursor<'_, R, C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(n) => {
                self.position = n;
                return Ok(n);
            }
            SeekFrom::End(delta) => (self.reader.total_len(), delta),
            SeekFrom::Current(delta) => (self.position, delta),
        };
        match base.checked_add_signed(delta) {
            Some(n) => {
                self.position = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
