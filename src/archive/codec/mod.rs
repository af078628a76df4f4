//! Codec layer for block compression.
//!
//! # Submodules
//!
//! - [`compression`][]: the [`BlockCodec`](compression::BlockCodec) seam and its raw DEFLATE implementation

pub mod compression;
