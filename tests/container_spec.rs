use bof_archive::archive::decoder::read_range_with;
use bof_archive::archive::writer::encode_with;
use bof_archive::{
    encode, pack_files, read_range, total_length, ArchiveConfig, ArchiveError, ArchiveReader, BlockCodec,
    BlockIndex, EncodedArchive, RawDeflate,
};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

const BLOCK_SIZES: &[u32] = &[7, 64, 1000, 8192];
const STREAM_LENGTHS: &[usize] = &[0, 1, 63, 64, 65, 999, 1000, 1001, 8192, 20000];

/// Deterministic, mildly compressible bytes.
fn stream(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            if i % 3 == 0 {
                b'a' + (i % 26) as u8
            } else {
                state as u8
            }
        })
        .collect()
}

fn config(block_size: u32) -> ArchiveConfig {
    ArchiveConfig::default().with_block_size(block_size)
}

fn with_entry(index: &BlockIndex, position: usize, value: u32) -> BlockIndex {
    let mut entries = index.entries();
    entries[position] = value;
    BlockIndex::from_entries(entries).expect("rebuild index")
}

fn corrupt_block(archive: &EncodedArchive, block: usize) -> Vec<u8> {
    let mut blob = archive.blob.clone();
    let start = archive.index.offset(block).expect("block start") as usize;
    let end = archive.index.offset(block + 1).expect("block end") as usize;
    for byte in &mut blob[start..end] {
        *byte = 0xFF;
    }
    blob
}

fn pack_fixture(dir: &Path, raw: &[u8], config: &ArchiveConfig) -> (PathBuf, PathBuf) {
    let input = dir.join("decoded.dump");
    let blob = dir.join("test.bof");
    let index = dir.join("test.idx");
    fs::write(&input, raw).unwrap_or_else(|e| panic!("failed to write {}: {}", input.display(), e));
    pack_files(&input, &blob, &index, config).expect("pack fixture");
    (blob, index)
}

#[test]
fn round_trip_for_all_lengths_and_block_sizes() {
    for &block_size in BLOCK_SIZES {
        for &len in STREAM_LENGTHS {
            let raw = stream(len);
            let archive = encode(&raw, &config(block_size)).expect("encode");
            let out = read_range(&archive.blob, &archive.index, block_size, 0, len as u64)
                .unwrap_or_else(|e| panic!("decode failed for len {} block {}: {}", len, block_size, e));
            assert_eq!(out, raw, "round trip mismatch for len {} block {}", len, block_size);
        }
    }
}

#[test]
fn partial_reads_match_source_slices() {
    let raw = stream(5000);
    for &block_size in &[64u32, 1000, 8192] {
        let archive = encode(&raw, &config(block_size)).expect("encode");
        for offset in (0..=5000u64).step_by(317) {
            for length in [0u64, 1, 63, 64, 65, 1000, 2500] {
                if offset + length > 5000 {
                    continue;
                }
                let got = read_range(&archive.blob, &archive.index, block_size, offset, length).unwrap_or_else(
                    |e| panic!("read {}+{} failed with block {}: {}", offset, length, block_size, e),
                );
                assert_eq!(
                    got,
                    &raw[offset as usize..(offset + length) as usize],
                    "slice mismatch at {}+{} with block {}",
                    offset,
                    length,
                    block_size
                );
            }
        }
    }
}

#[test]
fn index_arithmetic_holds() {
    for &block_size in BLOCK_SIZES {
        for &len in STREAM_LENGTHS {
            let archive = encode(&stream(len), &config(block_size)).expect("encode");
            let entries = archive.index.entries();
            let num_blocks = (len as u64).div_ceil(u64::from(block_size)) as usize;
            let blob_len = archive.blob.len() as u32;

            assert_eq!(archive.index.num_blocks(), num_blocks, "block count for len {}", len);
            assert_eq!(entries.len(), num_blocks + 3);
            assert_eq!(entries[num_blocks], blob_len);
            assert_eq!(entries[num_blocks + 1], blob_len);
            assert_eq!(entries[num_blocks + 2], len as u32);
            if num_blocks > 0 {
                assert_eq!(entries[0], 0);
            }
            for win in entries[..=num_blocks].windows(2) {
                assert!(win[0] <= win[1], "offsets decrease for len {} block {}", len, block_size);
            }
            assert_eq!(total_length(&archive.index), len as u64);
        }
    }
}

#[test]
fn empty_input() {
    for &block_size in BLOCK_SIZES {
        let archive = encode(b"", &config(block_size)).expect("encode");
        assert!(archive.blob.is_empty());
        assert_eq!(archive.index.entries(), vec![0, 0, 0]);
        assert_eq!(archive.index.to_bytes(), vec![0u8; 12]);
    }
}

#[test]
fn single_block_boundary() {
    let raw = stream(1000);
    let archive = encode(&raw, &config(1000)).expect("encode");
    let c = RawDeflate::default().compress(&raw).expect("compress").len() as u32;
    assert_eq!(archive.index.entries(), vec![0, c, c, 1000]);
}

#[test]
fn twenty_thousand_zeros_with_default_block_size() {
    let raw = vec![0u8; 20000];
    let archive = encode(&raw, &ArchiveConfig::default()).expect("encode");
    let entries = archive.index.entries();
    let blob_len = archive.blob.len() as u32;

    assert_eq!(archive.index.num_blocks(), 3);
    assert_eq!(entries[3], blob_len);
    assert_eq!(entries[4], blob_len);
    assert_eq!(entries[5], 20000);

    let reader = ArchiveReader::new(Cursor::new(archive.blob.clone()), archive.index.clone(), &ArchiveConfig::default())
        .expect("open reader");
    let sizes: Vec<usize> = reader.blocks().map(|b| b.expect("block").len()).collect();
    assert_eq!(sizes, vec![8192, 8192, 3616]);
}

#[test]
fn blocks_decode_independently() {
    let raw = stream(3 * 512);
    let archive = encode(&raw, &config(512)).expect("encode");
    let mut blob = corrupt_block(&archive, 0);
    let start = archive.index.offset(2).unwrap() as usize;
    for byte in &mut blob[start..] {
        *byte = 0xFF;
    }

    let got = read_range(&blob, &archive.index, 512, 600, 300).expect("read inside middle block");
    assert_eq!(got, &raw[600..900]);
    let whole = read_range(&blob, &archive.index, 512, 512, 512).expect("read whole middle block");
    assert_eq!(whole, &raw[512..1024]);

    let reader = ArchiveReader::new(Cursor::new(blob), archive.index.clone(), &config(512)).expect("open reader");
    assert_eq!(reader.read_range(512, 512).expect("reader middle block"), &raw[512..1024]);
    let err = reader.read_range(0, 10).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptBlock { block: 0, .. }), "got {:?}", err);
}

#[test]
fn read_past_end_is_out_of_range() {
    for &len in STREAM_LENGTHS {
        let raw = stream(len);
        let archive = encode(&raw, &config(64)).expect("encode");
        let err = read_range(&archive.blob, &archive.index, 64, len as u64, 1).unwrap_err();
        assert!(matches!(err, ArchiveError::OutOfRange { .. }), "len {}: got {:?}", len, err);

        let reader = ArchiveReader::new(Cursor::new(archive.blob), archive.index, &config(64)).expect("open reader");
        let err = reader.read_range(len as u64, 1).unwrap_err();
        assert!(matches!(err, ArchiveError::OutOfRange { .. }), "len {}: got {:?}", len, err);
    }
}

#[test]
fn offset_past_blob_is_corrupt_index() {
    let raw = stream(3 * 256);
    let archive = encode(&raw, &config(256)).expect("encode");
    let past_end = archive.blob.len() as u32 + 100;
    let index = with_entry(&archive.index, 1, past_end);

    for (offset, length) in [(256u64, 1u64), (300, 100), (0, 300), (200, 400)] {
        let err = read_range(&archive.blob, &index, 256, offset, length).unwrap_err();
        assert!(
            matches!(err, ArchiveError::CorruptIndex(_)),
            "read {}+{} touching block 1 returned {:?}",
            offset,
            length,
            err
        );
    }
    // Block 2 does not depend on entry 1.
    let tail = read_range(&archive.blob, &index, 256, 600, 100).expect("read block 2");
    assert_eq!(tail, &raw[600..700]);

    let err = ArchiveReader::new(Cursor::new(archive.blob.clone()), index, &config(256)).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptIndex(_)), "got {:?}", err);
}

#[test]
fn decreasing_offsets_are_corrupt_index() {
    let archive = encode(&stream(1000), &config(100)).expect("encode");
    let earlier = archive.index.offset(3).unwrap() as u32;
    let index = with_entry(&archive.index, 5, earlier);

    let err = read_range(&archive.blob, &index, 100, 450, 10).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptIndex(_)), "got {:?}", err);
}

#[test]
fn wrong_decoded_length_is_corrupt_block() {
    let raw = stream(100);
    let archive = encode(&raw, &config(64)).expect("encode");
    let index = with_entry(&archive.index, 4, 120);

    let err = read_range(&archive.blob, &index, 64, 64, 56).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptBlock { block: 1, .. }), "got {:?}", err);
    // The first block is intact and still readable.
    assert_eq!(read_range(&archive.blob, &index, 64, 0, 64).expect("block 0"), &raw[..64]);
}

#[test]
fn invalid_deflate_is_corrupt_block() {
    let raw = stream(300);
    let archive = encode(&raw, &config(100)).expect("encode");
    let blob = corrupt_block(&archive, 1);

    let err = read_range(&blob, &archive.index, 100, 150, 10).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptBlock { block: 1, .. }), "got {:?}", err);
}

#[test]
fn junk_after_last_block_stream_is_corrupt_block() {
    let raw = stream(300);
    let level6 = config(100).with_level(6);
    let archive = encode(&raw, &level6).expect("encode");
    let mut blob = archive.blob.clone();
    blob.extend_from_slice(&[0xAB; 17]);

    let n = archive.index.num_blocks();
    let grown = blob.len() as u32;
    let index = with_entry(&with_entry(&archive.index, n, grown), n + 1, grown);

    let err = read_range(&blob, &index, 100, 250, 50).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptBlock { block: 2, .. }), "got {:?}", err);
    assert_eq!(read_range(&blob, &index, 100, 0, 200).expect("intact blocks"), &raw[..200]);

    let reader = ArchiveReader::new(Cursor::new(blob), index, &level6).expect("index is well formed");
    let err = reader.read_range(250, 50).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptBlock { block: 2, .. }), "got {:?}", err);
    let err = reader.read_to_end().unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptBlock { block: 2, .. }), "got {:?}", err);
}

#[test]
fn file_reader_matches_in_memory_decode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = stream(50_000);
    let config = ArchiveConfig::default().with_level(6);
    let (blob_path, index_path) = pack_fixture(dir.path(), &raw, &config);

    let blob = fs::read(&blob_path).expect("read blob");
    let index = BlockIndex::from_bytes(&fs::read(&index_path).expect("read index")).expect("parse index");
    assert_eq!(index.byte_len(), (index.num_blocks() + 3) * 4);

    let reader = ArchiveReader::open(&blob_path, &index_path, &config).expect("open archive");
    assert_eq!(reader.total_len(), 50_000);
    assert_eq!(reader.blob_len(), blob.len() as u64);

    for (offset, length) in [(0u64, 50_000u64), (8191, 2), (16_000, 20_000), (49_999, 1), (50_000, 0)] {
        let from_file = reader.read_range(offset, length).expect("file read");
        let from_memory = read_range(&blob, &index, config.block_size, offset, length).expect("memory read");
        assert_eq!(from_file, from_memory, "mismatch at {}+{}", offset, length);
        assert_eq!(from_file, &raw[offset as usize..(offset + length) as usize]);
    }
    assert_eq!(reader.read_to_end().expect("read all"), raw);
}

#[test]
fn pack_replaces_existing_pair_atomically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ArchiveConfig::default();
    let (blob_path, index_path) = pack_fixture(dir.path(), &stream(10_000), &config);

    let raw = stream(30_000);
    let (blob_path2, index_path2) = pack_fixture(dir.path(), &raw, &config);
    assert_eq!((blob_path.clone(), index_path.clone()), (blob_path2, index_path2));

    let reader = ArchiveReader::open(&blob_path, &index_path, &config).expect("open repacked archive");
    assert_eq!(reader.read_to_end().expect("read all"), raw);

    let names: Vec<String> = fs::read_dir(dir.path())
        .expect("list dir")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        names.iter().all(|n| !n.ends_with(".tmp")),
        "temporary files left behind: {:?}",
        names
    );
}

#[test]
fn open_rejects_truncated_index_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ArchiveConfig::default();
    let (blob_path, index_path) = pack_fixture(dir.path(), &stream(20_000), &config);

    let mut bytes = fs::read(&index_path).expect("read index");
    bytes.pop();
    fs::write(&index_path, &bytes).expect("rewrite index");

    let err = ArchiveReader::open(&blob_path, &index_path, &config).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptIndex(_)), "got {:?}", err);
}

/// Stores blocks verbatim; stands in for any alternative algorithm.
struct Verbatim;

impl BlockCodec for Verbatim {
    fn compress(&self, block: &[u8]) -> io::Result<Vec<u8>> {
        Ok(block.to_vec())
    }

    fn decompress_into(&self, payload: &[u8], expected_len: usize, output: &mut Vec<u8>) -> io::Result<()> {
        if payload.len() != expected_len {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "length mismatch"));
        }
        output.clear();
        output.extend_from_slice(payload);
        Ok(())
    }
}

#[test]
fn block_codec_is_swappable() {
    let raw = stream(2500);
    let archive = encode_with(&raw, 1000, Verbatim).expect("encode");
    assert_eq!(archive.blob, raw);
    assert_eq!(archive.index.entries(), vec![0, 1000, 2000, 2500, 2500, 2500]);

    let got = read_range_with(&archive.blob, &archive.index, 1000, &Verbatim, 900, 1200).expect("read");
    assert_eq!(got, &raw[900..2100]);

    let reader = ArchiveReader::with_codec(Cursor::new(archive.blob), archive.index, 1000, Verbatim).expect("open");
    assert_eq!(reader.read_to_end().expect("read all"), raw);
}
