//! Random-access decoding over an in-memory blob.
//!
//! Process for a range request:
//! 1. Check the range against the decoded length
//! 2. Resolve the covering blocks from the index
//! 3. Decompress each covering block, and only those
//! 4. Copy the overlapping part of each block into the output

use std::ops::{Range, RangeInclusive};

use log::trace;

use super::codec::compression::{BlockCodec, RawDeflate};
use super::format::index::BlockIndex;
use super::types::error::{ArchiveError, Result};
use super::types::models::BlockMeta;

/// Length of the decoded stream described by `index`.
pub fn total_length(index: &BlockIndex) -> u64 {
    index.decoded_len()
}

/// Reads `length` bytes at `offset` of the decoded stream.
///
/// # Errors
/// - [`ArchiveError::OutOfRange`] if `offset + length` exceeds the decoded length
/// - [`ArchiveError::CorruptIndex`] if a covering block's offsets decrease or
///   point past the blob, or the block count disagrees with the stream length
/// - [`ArchiveError::CorruptBlock`] if a covering block fails to inflate to
///   its expected size
pub fn read_range(blob: &[u8], index: &BlockIndex, block_size: u32, offset: u64, length: u64) -> Result<Vec<u8>> {
    read_range_with(blob, index, block_size, &RawDeflate::default(), offset, length)
}

/// [`read_range`] with a caller-supplied block codec.
pub fn read_range_with<C: BlockCodec + ?Sized>(
    blob: &[u8],
    index: &BlockIndex,
    block_size: u32,
    codec: &C,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>> {
    if block_size == 0 {
        return Err(ArchiveError::InvalidConfig(
            "block size must be greater than zero".to_string(),
        ));
    }
    check_range(total_length(index), offset, length)?;
    if length == 0 {
        return Ok(Vec::new());
    }
    index.check_block_count(block_size)?;

    let mut output = Vec::with_capacity(length as usize);
    let mut block_bytes = Vec::new();

    for i in covering_blocks(offset, length, block_size) {
        let meta = index.block_meta(i, block_size, blob.len() as u64)?;
        let span = meta.compressed_range();
        decode_block_into(codec, &blob[span.start as usize..span.end as usize], &meta, &mut block_bytes)?;
        output.extend_from_slice(&block_bytes[overlap(&meta, offset, length)]);
    }

    Ok(output)
}

/// Fails with [`ArchiveError::OutOfRange`] unless `offset + length <= total`.
pub(crate) fn check_range(total: u64, offset: u64, length: u64) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= total => Ok(()),
        _ => Err(ArchiveError::OutOfRange { offset, length, total }),
    }
}

/// Blocks overlapping the non-empty range `offset..offset + length`.
pub(crate) fn covering_blocks(offset: u64, length: u64, block_size: u32) -> RangeInclusive<usize> {
    let block_size = u64::from(block_size);
    let first = offset / block_size;
    let last = (offset + length - 1) / block_size;
    first as usize..=last as usize
}

/// The part of `meta`'s decoded bytes that falls inside the request.
pub(crate) fn overlap(meta: &BlockMeta, offset: u64, length: u64) -> Range<usize> {
    let block = meta.decompressed_range();
    let start = offset.max(block.start) - block.start;
    let end = (offset + length).min(block.end) - block.start;
    start as usize..end as usize
}

/// Inflates one block, mapping codec failures to [`ArchiveError::CorruptBlock`].
pub(crate) fn decode_block_into<C: BlockCodec + ?Sized>(
    codec: &C,
    payload: &[u8],
    meta: &BlockMeta,
    output: &mut Vec<u8>,
) -> Result<()> {
    trace!(
        "Decoding block {}: decoded range {:?}, {} compressed bytes",
        meta.index,
        meta.decompressed_range(),
        payload.len()
    );
    codec
        .decompress_into(payload, meta.decompressed_size as usize, output)
        .map_err(|e| ArchiveError::CorruptBlock {
            block: meta.index,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::config::ArchiveConfig;
    use crate::archive::writer::encode;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn full_round_trip() {
        let raw = sample(20000);
        let archive = encode(&raw, &ArchiveConfig::default()).unwrap();
        let out = read_range(&archive.blob, &archive.index, 8192, 0, raw.len() as u64).unwrap();
        assert_eq!(out, raw);
        assert_eq!(total_length(&archive.index), 20000);
    }

    #[test]
    fn range_across_block_boundary() {
        let raw = sample(300);
        let archive = encode(&raw, &ArchiveConfig::default().with_block_size(100)).unwrap();
        let out = read_range(&archive.blob, &archive.index, 100, 95, 110).unwrap();
        assert_eq!(out, &raw[95..205]);
    }

    #[test]
    fn zero_length_reads_are_empty() {
        let raw = sample(10);
        let archive = encode(&raw, &ArchiveConfig::default().with_block_size(4)).unwrap();
        assert!(read_range(&archive.blob, &archive.index, 4, 10, 0).unwrap().is_empty());

        let empty = encode(b"", &ArchiveConfig::default()).unwrap();
        assert!(read_range(&empty.blob, &empty.index, 8192, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn read_at_end_is_out_of_range() {
        let raw = sample(10);
        let archive = encode(&raw, &ArchiveConfig::default().with_block_size(4)).unwrap();
        let err = read_range(&archive.blob, &archive.index, 4, 10, 1).unwrap_err();
        assert!(
            matches!(err, ArchiveError::OutOfRange { offset: 10, length: 1, total: 10 }),
            "got {:?}",
            err
        );

        let overflow = read_range(&archive.blob, &archive.index, 4, u64::MAX, 2).unwrap_err();
        assert!(matches!(overflow, ArchiveError::OutOfRange { .. }), "got {:?}", overflow);
    }

    #[test]
    fn covering_blocks_and_overlap() {
        assert_eq!(covering_blocks(0, 1, 8192), 0..=0);
        assert_eq!(covering_blocks(8191, 2, 8192), 0..=1);
        assert_eq!(covering_blocks(16384, 3616, 8192), 2..=2);

        let meta = BlockMeta {
            index: 1,
            compressed_offset: 0,
            compressed_size: 0,
            decompressed_offset: 100,
            decompressed_size: 100,
        };
        assert_eq!(overlap(&meta, 50, 100), 0..50);
        assert_eq!(overlap(&meta, 150, 10), 50..60);
        assert_eq!(overlap(&meta, 0, 1000), 0..100);
    }

    #[test]
    fn zero_block_size_is_invalid_config() {
        let archive = encode(&sample(100), &ArchiveConfig::default().with_block_size(50)).unwrap();
        for length in [0, 10] {
            let err = read_range_with(&archive.blob, &archive.index, 0, &RawDeflate::default(), 0, length).unwrap_err();
            assert!(matches!(err, ArchiveError::InvalidConfig(_)), "got {:?}", err);
        }
    }

    #[test]
    fn mismatched_block_count_is_corrupt_index() {
        let raw = sample(100);
        let archive = encode(&raw, &ArchiveConfig::default().with_block_size(50)).unwrap();
        let err = read_range(&archive.blob, &archive.index, 25, 0, 10).unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptIndex(_)), "got {:?}", err);
    }
}
