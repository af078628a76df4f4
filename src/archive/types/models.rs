//! Core data structures for container components.
//!
//! This module defines the fundamental types shared by the encoder and the
//! readers:
//! - Per-block location metadata resolved from the index
//! - The in-memory result of a one-shot encode

use std::ops::Range;

use crate::archive::format::index::BlockIndex;

/// Metadata describing a single compressed block.
///
/// Resolved from a [`BlockIndex`] and the container's block size. Each block
/// can be independently decompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMeta {
    /// Position of the block in the container, starting at 0.
    pub index: usize,
    /// Byte offset where this block's compressed data begins in the blob.
    pub compressed_offset: u64,
    /// Size of the compressed block data as stored in the blob (bytes).
    pub compressed_size: u64,
    /// Offset of this block in the decoded stream.
    pub decompressed_offset: u64,
    /// Size of the block after decompression (bytes).
    pub decompressed_size: u64,
}

impl BlockMeta {
    /// Byte range of the compressed payload within the blob.
    pub fn compressed_range(&self) -> Range<u64> {
        self.compressed_offset..self.compressed_offset + self.compressed_size
    }

    /// Byte range this block covers in the decoded stream.
    pub fn decompressed_range(&self) -> Range<u64> {
        self.decompressed_offset..self.decompressed_offset + self.decompressed_size
    }
}

/// A fully encoded container held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArchive {
    /// Concatenation of all compressed blocks.
    pub blob: Vec<u8>,
    pub index: BlockIndex,
}

impl EncodedArchive {
    /// Splits the archive into its two artifacts.
    pub fn into_parts(self) -> (Vec<u8>, BlockIndex) {
        (self.blob, self.index)
    }
}
