//! # bof-archive
//!
//! A seekable block-compressed container. A stream is split into fixed-size
//! blocks, each compressed independently with raw DEFLATE into a `.bof` blob,
//! and a `.idx` index records where every block starts. Any byte range can
//! then be read back by inflating only the blocks it overlaps.
//!
//! The block size is not stored in either file; encoder and reader must agree
//! on it (8192 bytes by default).
pub mod archive;

// Re-export the main types for convenience
pub use archive::{
    codec::compression::{BlockCodec, RawDeflate},
    decoder::{read_range, total_length},
    writer::{encode, pack_files, write_files, BlockWriter},
    ArchiveConfig,
    ArchiveError,
    ArchiveReader,
    BlockIndex,
    BlockMeta,
    EncodedArchive,
    Result,
};
