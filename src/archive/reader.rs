use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, info};

use super::codec::compression::{BlockCodec, RawDeflate};
use super::config::ArchiveConfig;
use super::decoder;
use super::format::index::BlockIndex;
use super::iter::{BlockIterator, DecodedCursor};
use super::types::error::{ArchiveError, Result};
use super::types::models::BlockMeta;

/// Random-access reader over a blob stream and its index.
///
/// Only the compressed bytes of the blocks a request overlaps are read from
/// the blob. The most recently decoded block is cached, so a run of small
/// reads inside one block inflates it once.
///
/// The reader can be shared between threads: blob I/O is serialized by a
/// lock, decompression is not.
#[derive(Debug)]
pub struct ArchiveReader<R, C = RawDeflate> {
    blob: Mutex<R>,
    blob_len: u64,
    index: BlockIndex,
    block_size: u32,
    codec: C,
    last_block: Mutex<Option<(usize, Arc<Vec<u8>>)>>,
}

impl ArchiveReader<File> {
    /// Opens a blob/index file pair.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Either file cannot be opened or read
    /// - The index is malformed or does not match the blob
    /// - The configured block size is zero
    pub fn open(blob_path: impl AsRef<Path>, index_path: impl AsRef<Path>, config: &ArchiveConfig) -> Result<Self> {
        let (blob_path, index_path) = (blob_path.as_ref(), index_path.as_ref());
        info!("Opening archive: {} + {}", blob_path.display(), index_path.display());

        let index = {
            let mut index_file = File::open(index_path)?;
            BlockIndex::read_from(&mut index_file)?
        };
        let blob = File::open(blob_path)?;
        Self::new(blob, index, config)
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Wraps an open blob stream and its parsed index.
    pub fn new(blob: R, index: BlockIndex, config: &ArchiveConfig) -> Result<Self> {
        config.validate()?;
        Self::with_codec(blob, index, config.block_size, RawDeflate::new(config.level))
    }
}

impl<R: Read + Seek, C: BlockCodec> ArchiveReader<R, C> {
    /// Wraps a blob stream with a caller-supplied block codec.
    ///
    /// The whole index is validated against the blob length up front.
    pub fn with_codec(mut blob: R, index: BlockIndex, block_size: u32, codec: C) -> Result<Self> {
        if block_size == 0 {
            return Err(ArchiveError::InvalidConfig(
                "block size must be greater than zero".to_string(),
            ));
        }
        let blob_len = blob.seek(SeekFrom::End(0))?;
        index.validate(blob_len, block_size)?;

        info!(
            "Archive opened: {} blocks of {} bytes, {} decoded bytes, {} compressed bytes",
            index.num_blocks(),
            block_size,
            index.decoded_len(),
            blob_len
        );

        Ok(Self {
            blob: Mutex::new(blob),
            blob_len,
            index,
            block_size,
            codec,
            last_block: Mutex::new(None),
        })
    }

    pub fn index(&self) -> &BlockIndex {
        &self.index
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn num_blocks(&self) -> usize {
        self.index.num_blocks()
    }

    /// Length of the decoded stream.
    pub fn total_len(&self) -> u64 {
        decoder::total_length(&self.index)
    }

    pub fn blob_len(&self) -> u64 {
        self.blob_len
    }

    /// Location metadata of block `block_index`.
    pub fn block_meta(&self, block_index: usize) -> Result<BlockMeta> {
        self.index.block_meta(block_index, self.block_size, self.blob_len)
    }

    /// Reads `length` bytes starting at `offset` of the decoded stream.
    ///
    /// # Errors
    /// - [`ArchiveError::OutOfRange`] if the range extends past [`total_len`](Self::total_len)
    /// - [`ArchiveError::CorruptBlock`] if a covering block fails to inflate
    /// - [`ArchiveError::Io`] if the blob cannot be read
    pub fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        decoder::check_range(self.total_len(), offset, length)?;
        if length == 0 {
            return Ok(Vec::new());
        }

        let mut output = Vec::with_capacity(length as usize);
        for i in decoder::covering_blocks(offset, length, self.block_size) {
            let meta = self.block_meta(i)?;
            let bytes = self.decoded_block(&meta)?;
            output.extend_from_slice(&bytes[decoder::overlap(&meta, offset, length)]);
        }
        Ok(output)
    }

    /// Reads and decodes a whole block.
    pub fn read_block(&self, block_index: usize) -> Result<Vec<u8>> {
        let meta = self.block_meta(block_index)?;
        Ok(self.decoded_block(&meta)?.to_vec())
    }

    /// Iterates over all decoded blocks in order.
    pub fn blocks(&self) -> BlockIterator<'_, R, C> {
        BlockIterator::new(self)
    }

    /// A `Read + Seek` view of the decoded stream.
    pub fn cursor(&self) -> DecodedCursor<'_, R, C> {
        DecodedCursor::new(self)
    }

    /// Decodes the whole stream.
    ///
    /// **Warning:** allocates the full decoded length.
    pub fn read_to_end(&self) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(self.total_len() as usize);
        for block in self.blocks() {
            output.extend_from_slice(&block?);
        }
        Ok(output)
    }

    /// Index of the block currently held in the decode cache.
    pub fn cached_block(&self) -> Result<Option<usize>> {
        let cached = self.last_block.lock().map_err(|_| ArchiveError::LockPoisoned)?;
        Ok(cached.as_ref().map(|(i, _)| *i))
    }

    fn decoded_block(&self, meta: &BlockMeta) -> Result<Arc<Vec<u8>>> {
        {
            let cached = self.last_block.lock().map_err(|_| ArchiveError::LockPoisoned)?;
            if let Some((i, bytes)) = cached.as_ref() {
                if *i == meta.index {
                    return Ok(Arc::clone(bytes));
                }
            }
        }

        let payload = self.read_payload(meta)?;
        let mut decoded = Vec::new();
        decoder::decode_block_into(&self.codec, &payload, meta, &mut decoded)?;
        let decoded = Arc::new(decoded);

        *self.last_block.lock().map_err(|_| ArchiveError::LockPoisoned)? = Some((meta.index, Arc::clone(&decoded)));
        Ok(decoded)
    }

    fn read_payload(&self, meta: &BlockMeta) -> Result<Vec<u8>> {
        debug!(
            "Reading block {} from blob offset {} ({} bytes)",
            meta.index, meta.compressed_offset, meta.compressed_size
        );
        let mut payload = vec![0u8; meta.compressed_size as usize];
        let mut blob = self.blob.lock().map_err(|_| ArchiveError::LockPoisoned)?;
        blob.seek(SeekFrom::Start(meta.compressed_offset))?;
        blob.read_exact(&mut payload)?;
        Ok(payload)
    }
}
