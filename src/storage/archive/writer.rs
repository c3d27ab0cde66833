//! Archive Writer
//!
//! Streams ascending records into a new archive file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use tracing::debug;

use super::{
    ArchiveMeta, BlockHandle, BLOCK_HEADER_SIZE, ENTRY_COUNT_OFFSET, HEADER_SIZE, INDEX_ENTRY_SIZE,
    MAGIC, VERSION,
};
use crate::config::Config;
use crate::encoding::{EncodingDefinition, RecordWriter};
use crate::error::{HistError, Result};
use crate::model::{HistorianKey, HistorianValue};

/// Builder for archive files. Keys must arrive strictly ascending.
pub struct ArchiveWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    encoding: EncodingDefinition,
    records: RecordWriter,
    records_per_block: u32,
    /// Compressed records of the open block
    block: BytesMut,
    block_records: u32,
    block_first_key: HistorianKey,
    index: Vec<BlockHandle>,
    current_offset: u64,
    entry_count: u64,
    first_key: Option<HistorianKey>,
    last_key: Option<HistorianKey>,
    data_hasher: crc32fast::Hasher,
}

impl ArchiveWriter {
    /// Create the file and write its header.
    ///
    /// Call `add()` in ascending key order, then `finish()`.
    pub fn create(path: &Path, config: &Config) -> Result<Self> {
        config.validate()?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        let (key_tag, value_tag) = config.encoding.tags();
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?; // entry count, patched in finish
        writer.write_all(&[key_tag, value_tag])?;
        writer.write_all(&config.records_per_block.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            encoding: config.encoding,
            records: config.encoding.writer(),
            records_per_block: config.records_per_block,
            block: BytesMut::new(),
            block_records: 0,
            block_first_key: HistorianKey::default(),
            index: Vec::new(),
            current_offset: HEADER_SIZE,
            entry_count: 0,
            first_key: None,
            last_key: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append one record
    pub fn add(&mut self, key: &HistorianKey, value: &HistorianValue) -> Result<()> {
        if let Some(last) = self.last_key {
            if *key <= last {
                return Err(HistError::UnsortedWrite(format!(
                    "{} does not follow {}",
                    key, last
                )));
            }
        }

        if self.block_records == 0 {
            self.block_first_key = *key;
            self.records.reset();
        }
        self.records.write(&mut self.block, key, value);
        self.block_records += 1;

        if self.first_key.is_none() {
            self.first_key = Some(*key);
        }
        self.last_key = Some(*key);
        self.entry_count += 1;

        if self.block_records >= self.records_per_block {
            self.flush_block()?;
        }
        Ok(())
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.block_records == 0 {
            return Ok(());
        }

        let count_bytes = self.block_records.to_le_bytes();
        let len_bytes = (self.block.len() as u32).to_le_bytes();

        self.writer.write_all(&count_bytes)?;
        self.writer.write_all(&len_bytes)?;
        self.writer.write_all(&self.block)?;

        self.data_hasher.update(&count_bytes);
        self.data_hasher.update(&len_bytes);
        self.data_hasher.update(&self.block);

        self.index.push(BlockHandle {
            first_key: self.block_first_key,
            offset: self.current_offset,
        });
        self.current_offset += BLOCK_HEADER_SIZE + self.block.len() as u64;

        self.block.clear();
        self.block_records = 0;
        Ok(())
    }

    /// Write the last block, index, meta and footer
    pub fn finish(mut self) -> Result<ArchiveMeta> {
        self.flush_block()?;

        let index_offset = self.current_offset;
        self.writer.write_all(&(self.index.len() as u32).to_le_bytes())?;
        for handle in &self.index {
            self.writer.write_all(&handle.first_key.timestamp.to_le_bytes())?;
            self.writer.write_all(&handle.first_key.point_id.to_le_bytes())?;
            self.writer.write_all(&handle.offset.to_le_bytes())?;
        }
        let meta_offset = index_offset + 4 + self.index.len() as u64 * INDEX_ENTRY_SIZE;

        let meta = ArchiveMeta {
            entry_count: self.entry_count,
            block_count: self.index.len() as u64,
            first_key: self.first_key,
            last_key: self.last_key,
            encoding: self.encoding,
        };
        let meta_bytes = bincode::serialize(&meta)?;
        self.writer.write_all(&(meta_bytes.len() as u32).to_le_bytes())?;
        self.writer.write_all(&meta_bytes)?;

        let data_crc = self.data_hasher.finalize();
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&meta_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| HistError::Io(e.into_error()))?;
        file.seek(SeekFrom::Start(ENTRY_COUNT_OFFSET))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        debug!(
            path = %self.path.display(),
            entries = meta.entry_count,
            blocks = meta.block_count,
            "Archive written"
        );
        Ok(meta)
    }
}
