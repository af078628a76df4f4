//! Core container module: encoder, index layout, and random-access readers.

pub mod codec;
pub mod config;
pub mod decoder;
pub mod format;
pub mod iter;
pub mod reader;
pub mod types;
pub mod writer;
mod utils;

pub use config::{ArchiveConfig, DEFAULT_BLOCK_SIZE};
pub use format::index::BlockIndex;
pub use reader::ArchiveReader;
pub use types::error::{ArchiveError, Result};
pub use types::models::{BlockMeta, EncodedArchive};
