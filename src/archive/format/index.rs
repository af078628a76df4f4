//! # Block Index Layout
//!
//! The index file is a flat sequence of little-endian `u32` values and is the
//! only part of the container that must be bit-exact across implementations:
//!
//! ```text
//! ┌──────────────┬─────┬────────────────┬────────────┬──────────┬─────────────┐
//! │ offset[0]=0  │ ... │ offset[n-1]    │ end_offset │ reserved │ decoded_len │
//! └──────────────┴─────┴────────────────┴────────────┴──────────┴─────────────┘
//!   start of each compressed block        blob length  (= end)    stream length
//! ```
//!
//! `n` is the block count, so the file holds `(n + 3) * 4` bytes. The block
//! size is not stored; callers supply it.

use std::io::{self, Read, Write};
use std::ops::Range;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};

use crate::archive::types::error::{ArchiveError, Result};
use crate::archive::types::models::BlockMeta;

/// Size of one index entry in bytes.
pub const ENTRY_SIZE: usize = 4;

/// Entries following the per-block offsets.
pub const TRAILER_ENTRIES: usize = 3;

/// Parsed form of an index file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockIndex {
    offsets: Vec<u32>,
    end_offset: u32,
    /// Written as a copy of `end_offset`. Kept for wire compatibility only.
    reserved: u32,
    decoded_len: u32,
}

impl BlockIndex {
    /// Builds an index the way the encoder lays it out, with the reserved
    /// sentinel set to `end_offset`.
    pub fn new(offsets: Vec<u32>, end_offset: u32, decoded_len: u32) -> Self {
        Self {
            offsets,
            end_offset,
            reserved: end_offset,
            decoded_len,
        }
    }

    /// Builds an index from its flat entry list.
    ///
    /// # Errors
    /// Returns [`ArchiveError::CorruptIndex`] if fewer than three entries are given.
    pub fn from_entries(mut entries: Vec<u32>) -> Result<Self> {
        if entries.len() < TRAILER_ENTRIES {
            return Err(ArchiveError::CorruptIndex(format!(
                "index holds {} entries, at least {} are required",
                entries.len(),
                TRAILER_ENTRIES
            )));
        }
        let trailer = entries.split_off(entries.len() - TRAILER_ENTRIES);
        Ok(Self {
            offsets: entries,
            end_offset: trailer[0],
            reserved: trailer[1],
            decoded_len: trailer[2],
        })
    }

    /// Returns the flat entry list as stored on disk.
    pub fn entries(&self) -> Vec<u32> {
        let mut entries = Vec::with_capacity(self.entry_count());
        entries.extend_from_slice(&self.offsets);
        entries.extend_from_slice(&[self.end_offset, self.reserved, self.decoded_len]);
        entries
    }

    /// Parses an index from its serialized bytes.
    ///
    /// # Errors
    /// Returns [`ArchiveError::CorruptIndex`] if the length is not a multiple of
    /// [`ENTRY_SIZE`] or the trailer is missing.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(ArchiveError::CorruptIndex(format!(
                "index length {} is not a multiple of {}",
                bytes.len(),
                ENTRY_SIZE
            )));
        }

        let mut reader = bytes;
        let mut entries = Vec::with_capacity(bytes.len() / ENTRY_SIZE);
        while !reader.is_empty() {
            entries.push(reader.read_u32::<LittleEndian>()?);
        }

        let index = Self::from_entries(entries)?;
        debug!(
            "Index parsed: {} blocks, {} compressed bytes, {} decoded bytes",
            index.num_blocks(),
            index.end_offset,
            index.decoded_len
        );
        Ok(index)
    }

    /// Reads a complete index from `reader` until EOF.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Serializes the index into its on-disk form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());
        for entry in self.entries() {
            bytes.extend_from_slice(&entry.to_le_bytes());
        }
        bytes
    }

    /// Writes the on-disk form of the index to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for entry in self.entries() {
            writer.write_u32::<LittleEndian>(entry)?;
        }
        Ok(())
    }

    pub fn num_blocks(&self) -> usize {
        self.offsets.len()
    }

    pub fn entry_count(&self) -> usize {
        self.offsets.len() + TRAILER_ENTRIES
    }

    /// Size of the serialized index in bytes.
    pub fn byte_len(&self) -> usize {
        self.entry_count() * ENTRY_SIZE
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Total compressed size recorded by the encoder.
    pub fn end_offset(&self) -> u64 {
        u64::from(self.end_offset)
    }

    pub fn reserved(&self) -> u64 {
        u64::from(self.reserved)
    }

    /// Length of the original stream (the last entry).
    pub fn decoded_len(&self) -> u64 {
        u64::from(self.decoded_len)
    }

    /// Start offset of block `i`; `i == num_blocks()` yields the end offset.
    pub fn offset(&self, i: usize) -> Option<u64> {
        match i.cmp(&self.offsets.len()) {
            std::cmp::Ordering::Less => Some(u64::from(self.offsets[i])),
            std::cmp::Ordering::Equal => Some(self.end_offset()),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Block count a stream of `decoded_len()` bytes must have.
    pub fn expected_num_blocks(&self, block_size: u32) -> u64 {
        self.decoded_len().div_ceil(u64::from(block_size))
    }

    /// Checks that the block count agrees with the stream length.
    pub fn check_block_count(&self, block_size: u32) -> Result<()> {
        let expected = self.expected_num_blocks(block_size);
        if expected != self.num_blocks() as u64 {
            return Err(ArchiveError::CorruptIndex(format!(
                "{} blocks recorded, but {} decoded bytes in blocks of {} need {}",
                self.num_blocks(),
                self.decoded_len,
                block_size,
                expected
            )));
        }
        Ok(())
    }

    /// Decoded size of block `i`: `block_size`, or the remainder for the last block.
    pub fn expected_block_len(&self, i: usize, block_size: u32) -> u64 {
        let block_size = u64::from(block_size);
        if i + 1 < self.num_blocks() {
            block_size
        } else {
            self.decoded_len().saturating_sub(i as u64 * block_size)
        }
    }

    /// Compressed byte range of block `i` inside a blob of `blob_len` bytes.
    ///
    /// # Errors
    /// Returns [`ArchiveError::CorruptIndex`] if the block does not exist, its
    /// offsets decrease, or it extends past the blob.
    pub fn block_span(&self, i: usize, blob_len: u64) -> Result<Range<u64>> {
        let (start, end) = match (self.offset(i), self.offset(i + 1)) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(ArchiveError::CorruptIndex(format!(
                    "block {} is beyond the {} indexed blocks",
                    i,
                    self.num_blocks()
                )))
            }
        };
        if end < start {
            return Err(ArchiveError::CorruptIndex(format!(
                "block {} ends at {} before it starts at {}",
                i, end, start
            )));
        }
        if end > blob_len {
            return Err(ArchiveError::CorruptIndex(format!(
                "block {} spans {}..{}, past the blob length {}",
                i, start, end, blob_len
            )));
        }
        Ok(start..end)
    }

    /// Resolves the full location metadata of block `i`.
    pub fn block_meta(&self, i: usize, block_size: u32, blob_len: u64) -> Result<BlockMeta> {
        let span = self.block_span(i, blob_len)?;
        Ok(BlockMeta {
            index: i,
            compressed_offset: span.start,
            compressed_size: span.end - span.start,
            decompressed_offset: i as u64 * u64::from(block_size),
            decompressed_size: self.expected_block_len(i, block_size),
        })
    }

    /// Checks every structural invariant against the matching blob.
    ///
    /// A reserved sentinel that differs from the end offset is tolerated and
    /// only logged.
    ///
    /// # Errors
    /// Returns [`ArchiveError::CorruptIndex`] on the first violation found.
    pub fn validate(&self, blob_len: u64, block_size: u32) -> Result<()> {
        if let Some(&first) = self.offsets.first() {
            if first != 0 {
                return Err(ArchiveError::CorruptIndex(format!(
                    "first block starts at {}, expected 0",
                    first
                )));
            }
        }
        for i in 0..self.num_blocks() {
            self.block_span(i, blob_len)?;
        }
        if self.end_offset() != blob_len {
            return Err(ArchiveError::CorruptIndex(format!(
                "index records {} compressed bytes, blob holds {}",
                self.end_offset, blob_len
            )));
        }
        self.check_block_count(block_size)?;

        if self.reserved != self.end_offset {
            warn!(
                "Reserved index entry {} differs from end offset {}; ignoring it",
                self.reserved, self.end_offset
            );
        }
        Ok(())
    }
}
