//! Encoding: chunking a stream into blocks and building the index.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info, trace};

use super::codec::compression::{BlockCodec, RawDeflate};
use super::config::ArchiveConfig;
use super::format::index::BlockIndex;
use super::types::error::{ArchiveError, Result};
use super::types::models::EncodedArchive;
use super::utils::{self, PendingFile};

/// Encodes `raw` into a blob and its index using `config`.
///
/// Empty input produces an empty blob and the index `[0, 0, 0]`.
///
/// # Errors
/// Returns [`ArchiveError::InvalidConfig`] for a zero block size or an
/// out-of-range level, and [`ArchiveError::IndexOverflow`] if a length does
/// not fit a 32-bit index entry.
pub fn encode(raw: &[u8], config: &ArchiveConfig) -> Result<EncodedArchive> {
    config.validate()?;
    encode_with(raw, config.block_size, RawDeflate::new(config.level))
}

/// Encodes `raw` with a caller-supplied block codec.
pub fn encode_with<C: BlockCodec>(raw: &[u8], block_size: u32, codec: C) -> Result<EncodedArchive> {
    let mut writer = BlockWriter::with_codec(Vec::with_capacity(raw.len()), block_size, codec)?;
    for block in raw.chunks(writer.block_size) {
        writer.push_block(block)?;
    }
    let (blob, index) = writer.finish()?;
    Ok(EncodedArchive { blob, index })
}

/// Streaming encoder writing compressed blocks to `W` as soon as they fill.
///
/// Output is identical to [`encode`] no matter how the input is split across
/// writes. Partial blocks are only emitted by [`BlockWriter::finish`];
/// [`Write::flush`] flushes the inner writer but never cuts a block short.
pub struct BlockWriter<W: Write, C: BlockCodec = RawDeflate> {
    inner: W,
    codec: C,
    block_size: usize,
    raw_buffer: Vec<u8>,
    offsets: Vec<u32>,
    blob_len: u64,
    decoded_len: u64,
}

impl<W: Write> BlockWriter<W> {
    pub fn new(inner: W, config: &ArchiveConfig) -> Result<Self> {
        config.validate()?;
        Self::with_codec(inner, config.block_size, RawDeflate::new(config.level))
    }
}

impl<W: Write, C: BlockCodec> BlockWriter<W, C> {
    pub fn with_codec(inner: W, block_size: u32, codec: C) -> Result<Self> {
        if block_size == 0 {
            return Err(ArchiveError::InvalidConfig(
                "block size must be greater than zero".to_string(),
            ));
        }
        let block_size = block_size as usize;
        Ok(Self {
            inner,
            codec,
            block_size,
            raw_buffer: Vec::with_capacity(block_size),
            offsets: Vec::new(),
            blob_len: 0,
            decoded_len: 0,
        })
    }

    /// Number of complete blocks written so far.
    pub fn blocks_written(&self) -> usize {
        self.offsets.len()
    }

    /// Buffers `buf`, compressing and writing every block it completes.
    pub fn append(&mut self, buf: &[u8]) -> Result<()> {
        let mut cursor = 0;

        while cursor < buf.len() {
            let remaining = &buf[cursor..];

            // Whole blocks bypass the buffer when nothing is pending.
            if self.raw_buffer.is_empty() && remaining.len() >= self.block_size {
                self.push_block(&remaining[..self.block_size])?;
                cursor += self.block_size;
                continue;
            }

            let space = self.block_size - self.raw_buffer.len();
            let to_write = space.min(remaining.len());
            self.raw_buffer.extend_from_slice(&remaining[..to_write]);
            cursor += to_write;

            if self.raw_buffer.len() == self.block_size {
                self.flush_buffer()?;
            }
        }
        Ok(())
    }

    /// Flushes the final partial block and returns the inner writer with the
    /// completed index.
    pub fn finish(mut self) -> Result<(W, BlockIndex)> {
        self.flush_buffer()?;
        self.inner.flush()?;

        let end_offset = utils::to_entry(self.blob_len, "blob")?;
        let decoded_len = utils::to_entry(self.decoded_len, "decoded stream")?;
        let index = BlockIndex::new(self.offsets, end_offset, decoded_len);

        debug!(
            "Encoded {} bytes into {} blocks, {} compressed bytes",
            self.decoded_len,
            index.num_blocks(),
            self.blob_len
        );
        Ok((self.inner, index))
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.raw_buffer.is_empty() {
            return Ok(());
        }
        let block = std::mem::take(&mut self.raw_buffer);
        let result = self.push_block(&block);
        self.raw_buffer = block;
        self.raw_buffer.clear();
        result
    }

    /// Compresses one block and records its start offset.
    fn push_block(&mut self, block: &[u8]) -> Result<()> {
        let offset = utils::to_entry(self.blob_len, "blob")?;
        utils::to_entry(self.decoded_len + block.len() as u64, "decoded stream")?;

        let payload = self.codec.compress(block)?;
        self.inner.write_all(&payload)?;

        trace!(
            "Block {} at blob offset {}: {} bytes -> {} bytes",
            self.offsets.len(),
            offset,
            block.len(),
            payload.len()
        );

        self.offsets.push(offset);
        self.blob_len += payload.len() as u64;
        self.decoded_len += block.len() as u64;
        Ok(())
    }
}

impl<W: Write, C: BlockCodec> Write for BlockWriter<W, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes an encoded pair to disk, replacing both targets only once both
/// artifacts are fully written.
pub fn write_files(
    blob: &[u8],
    index: &BlockIndex,
    blob_path: impl AsRef<Path>,
    index_path: impl AsRef<Path>,
) -> Result<()> {
    let (blob_pending, mut blob_file) = PendingFile::create(blob_path.as_ref())?;
    let (index_pending, mut index_file) = PendingFile::create(index_path.as_ref())?;

    blob_file.write_all(blob)?;
    blob_file.sync_all()?;
    index_file.write_all(&index.to_bytes())?;
    index_file.sync_all()?;
    drop(blob_file);
    drop(index_file);

    // Index last: a reader never sees a new index next to an old blob.
    blob_pending.commit()?;
    index_pending.commit()?;
    Ok(())
}

/// Encodes the file at `input` into a blob/index pair on disk.
///
/// Both artifacts are written to temporary siblings and renamed into place
/// only after the whole input was encoded, blob first, then index. If
/// encoding or writing fails, the temporaries are removed and existing
/// targets are left untouched. If the index rename itself fails, the new
/// blob is already in place next to the old index; [`ArchiveReader`] rejects
/// that pair because the end offset no longer matches the blob length.
///
/// [`ArchiveReader`]: crate::archive::reader::ArchiveReader
pub fn pack_files(
    input: impl AsRef<Path>,
    blob_path: impl AsRef<Path>,
    index_path: impl AsRef<Path>,
    config: &ArchiveConfig,
) -> Result<BlockIndex> {
    let (input, blob_path, index_path) = (input.as_ref(), blob_path.as_ref(), index_path.as_ref());
    config.validate()?;
    info!(
        "Packing {} into {} + {} (block size {}, level {})",
        input.display(),
        blob_path.display(),
        index_path.display(),
        config.block_size,
        config.level
    );

    let mut source = BufReader::new(File::open(input)?);
    let (blob_pending, blob_file) = PendingFile::create(blob_path)?;
    let (index_pending, mut index_file) = PendingFile::create(index_path)?;

    let mut writer = BlockWriter::new(BufWriter::new(blob_file), config)?;
    let mut chunk = vec![0u8; config.block_size as usize];
    loop {
        let n = match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.append(&chunk[..n])?;
    }

    let (blob_writer, index) = writer.finish()?;
    let blob_file = blob_writer.into_inner().map_err(|e| e.into_error())?;
    blob_file.sync_all()?;
    drop(blob_file);

    index.write_to(&mut index_file)?;
    index_file.sync_all()?;
    drop(index_file);

    blob_pending.commit()?;
    index_pending.commit()?;

    info!(
        "Packed {} bytes into {} blocks ({} compressed bytes)",
        index.decoded_len(),
        index.num_blocks(),
        index.end_offset()
    );
    Ok(index)
}
