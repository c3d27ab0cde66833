//! Block source
//!
//! Decodes an archive one block at a time. Seeking consults the sparse
//! index and only reloads when the target lies in a later block.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::sync::Arc;

use tracing::trace;

use super::{BlockHandle, BLOCK_HEADER_SIZE};
use crate::encoding::RecordReader;
use crate::error::{HistError, Result};
use crate::model::{HistorianKey, HistorianValue};
use crate::storage::cursor::SortedSource;

pub(crate) struct BlockSource {
    file: BufReader<File>,
    index: Arc<[BlockHandle]>,
    records: RecordReader,
    /// First byte past the data blocks
    data_end: u64,
    /// Index of the block `next_record` loads once the current one drains
    next_block: usize,
    block: Vec<u8>,
    position: usize,
    remaining: u32,
}

impl BlockSource {
    pub(crate) fn new(
        file: BufReader<File>,
        index: Arc<[BlockHandle]>,
        records: RecordReader,
        data_end: u64,
    ) -> Self {
        Self {
            file,
            index,
            records,
            data_end,
            next_block: 0,
            block: Vec::new(),
            position: 0,
            remaining: 0,
        }
    }

    fn load_block(&mut self, block: usize) -> Result<()> {
        let handle = self.index[block];
        self.file.seek(SeekFrom::Start(handle.offset))?;

        let mut header = [0u8; BLOCK_HEADER_SIZE as usize];
        self.file.read_exact(&mut header)?;
        let count = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;

        if handle.offset + BLOCK_HEADER_SIZE + len > self.data_end {
            return Err(HistError::Corruption(format!(
                "block {} at offset {} runs past the data section",
                block, handle.offset
            )));
        }

        self.block.resize(len as usize, 0);
        self.file.read_exact(&mut self.block)?;
        self.position = 0;
        self.remaining = count;
        self.records.reset();
        self.next_block = block + 1;

        trace!(block, records = count, bytes = len, "Loaded archive block");
        Ok(())
    }
}

impl SortedSource for BlockSource {
    fn seek(&mut self, key: &HistorianKey) -> Result<()> {
        if self.index.is_empty() {
            return Ok(());
        }
        let target = self
            .index
            .partition_point(|handle| handle.first_key <= *key)
            .saturating_sub(1);

        // Targets at or behind the loaded block are reached by reading on
        if target >= self.next_block {
            self.load_block(target)?;
        }
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<(HistorianKey, HistorianValue)>> {
        while self.remaining == 0 {
            if self.position != self.block.len() {
                return Err(HistError::Corruption(format!(
                    "{} trailing bytes after the last record of a block",
                    self.block.len() - self.position
                )));
            }
            if self.next_block >= self.index.len() {
                return Ok(None);
            }
            self.load_block(self.next_block)?;
        }

        let mut input = &self.block[self.position..];
        let mut key = HistorianKey::default();
        let mut value = HistorianValue::default();
        self.records.read(&mut input, &mut key, &mut value)?;

        self.position = self.block.len() - input.len();
        self.remaining -= 1;
        Ok(Some((key, value)))
    }
}
