//! Container configuration agreed upon by encoder and decoder.
//!
//! Neither the blob nor the index records the block size, so both sides
//! must be handed the same [`ArchiveConfig`] out of band.

use super::types::error::{ArchiveError, Result};

/// Block size used by existing `.bof`/`.idx` pairs.
pub const DEFAULT_BLOCK_SIZE: u32 = 0x2000;

/// Store-only DEFLATE: blocks are framed but not compressed.
pub const DEFAULT_LEVEL: u32 = 0;

/// Highest DEFLATE level accepted by the codec.
pub const MAX_LEVEL: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Decoded size of every block except the last.
    pub block_size: u32,
    /// DEFLATE compression level, `0..=9`. Only relevant when encoding.
    pub level: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            level: DEFAULT_LEVEL,
        }
    }
}

impl ArchiveConfig {
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Checks that the configuration describes a usable container.
    ///
    /// # Errors
    /// Returns [`ArchiveError::InvalidConfig`] when the block size is zero or
    /// the level is above [`MAX_LEVEL`].
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(ArchiveError::InvalidConfig(
                "block size must be greater than zero".to_string(),
            ));
        }
        if self.level > MAX_LEVEL {
            return Err(ArchiveError::InvalidConfig(format!(
                "compression level {} is above the maximum of {}",
                self.level, MAX_LEVEL
            )));
        }
        Ok(())
    }
}
