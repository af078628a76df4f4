//! Per-block compression.
//!
//! Blocks are stored as bare raw DEFLATE streams (no zlib or gzip wrapper,
//! no preset dictionary). The chunking and indexing logic only talks to the
//! [`BlockCodec`] trait, so the algorithm can be swapped without touching it.

use std::io::{self, Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use log::trace;

/// Compresses and decompresses one block at a time.
pub trait BlockCodec: Send + Sync {
    /// Compresses a single block into an independently decodable payload.
    fn compress(&self, block: &[u8]) -> io::Result<Vec<u8>>;

    /// Decompresses `payload` into `output`, replacing its contents.
    ///
    /// # Validation
    /// Fails with [`io::ErrorKind::InvalidData`] unless the payload decodes to
    /// exactly `expected_len` bytes and nothing follows the encoded data.
    fn decompress_into(&self, payload: &[u8], expected_len: usize, output: &mut Vec<u8>) -> io::Result<()>;
}

/// Raw DEFLATE via flate2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDeflate {
    level: u32,
}

impl RawDeflate {
    /// Creates a codec compressing at `level` (`0` stores blocks uncompressed).
    pub fn new(level: u32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for RawDeflate {
    fn default() -> Self {
        Self::new(crate::archive::config::DEFAULT_LEVEL)
    }
}

impl BlockCodec for RawDeflate {
    fn compress(&self, block: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::with_capacity(block.len() + 16), Compression::new(self.level));
        encoder.write_all(block)?;
        let compressed = encoder.finish()?;
        trace!(
            "Deflated block at level {}: {} bytes -> {} bytes",
            self.level,
            block.len(),
            compressed.len()
        );
        Ok(compressed)
    }

    fn decompress_into(&self, payload: &[u8], expected_len: usize, output: &mut Vec<u8>) -> io::Result<()> {
        trace!(
            "Inflating block: {} bytes -> {} bytes (expected)",
            payload.len(),
            expected_len
        );
        output.clear();
        output.reserve(expected_len);

        // One byte of slack so oversized blocks are detected without inflating them fully.
        let mut decoder = DeflateDecoder::new(payload).take(expected_len as u64 + 1);
        decoder.read_to_end(output)?;
        let consumed = decoder.get_ref().total_in();

        if output.len() != expected_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "inflated to {}{} bytes, expected {}",
                    if output.len() > expected_len { "more than " } else { "" },
                    output.len().min(expected_len),
                    expected_len
                ),
            ));
        }
        // The stored span must hold exactly one stream.
        if consumed != payload.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "trailing bytes after deflate stream: consumed {} of {} bytes",
                    consumed,
                    payload.len()
                ),
            ));
        }
        Ok(())
    }
}
