//! Archive Reader
//!
//! Opens archive files, loads the sparse index into memory, and hands out
//! read sessions. Each cursor opens its own file handle.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::cursor::BlockSource;
use super::{
    ArchiveMeta, BlockHandle, FOOTER_SIZE, HEADER_SIZE, INDEX_ENTRY_SIZE, MAGIC, VERSION,
};
use crate::encoding::varint::{get_u16_le, get_u32_le, get_u64_le, get_u8};
use crate::encoding::EncodingDefinition;
use crate::error::{HistError, Result};
use crate::filters::ScanFilters;
use crate::model::HistorianKey;
use crate::storage::cursor::FilteredCursor;
use crate::storage::{
    CursorGuard, EngineReader, ReaderOptions, SessionGuard, SessionStats, SortedTreeEngine,
    TreeStream,
};

const VERIFY_CHUNK: usize = 64 * 1024;

/// An opened, immutable archive
#[derive(Debug)]
pub struct ArchiveFile {
    path: PathBuf,
    encoding: EncodingDefinition,
    records_per_block: u32,
    index_offset: u64,
    data_crc: u32,
    index: Arc<[BlockHandle]>,
    meta: ArchiveMeta,
    stats: Arc<SessionStats>,
}

impl ArchiveFile {
    /// Open an archive and load its index and metadata
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(HistError::Corruption(format!(
                "archive is {} bytes, smaller than header and footer",
                file_size
            )));
        }

        // Header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(HistError::Corruption(format!(
                "invalid archive magic: expected HIST, got {:?}",
                &header[0..4]
            )));
        }
        let mut input: &[u8] = &header[4..];
        let version = get_u16_le(&mut input)?;
        if version != VERSION {
            return Err(HistError::Corruption(format!(
                "unsupported archive version: {}",
                version
            )));
        }
        let entry_count = get_u64_le(&mut input)?;
        let key_tag = get_u8(&mut input)?;
        let value_tag = get_u8(&mut input)?;
        let records_per_block = get_u32_le(&mut input)?;
        let encoding = EncodingDefinition::from_tags(key_tag, value_tag)?;

        // Footer
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let mut input: &[u8] = &footer;
        let index_offset = get_u64_le(&mut input)?;
        let meta_offset = get_u64_le(&mut input)?;
        let data_crc = get_u32_le(&mut input)?;

        let footer_start = file_size - FOOTER_SIZE;
        if index_offset < HEADER_SIZE || meta_offset < index_offset || meta_offset > footer_start {
            return Err(HistError::Corruption(format!(
                "footer offsets out of bounds: index {}, meta {}, file {}",
                index_offset, meta_offset, file_size
            )));
        }

        // Index and meta sit back to back between the data and the footer
        file.seek(SeekFrom::Start(index_offset))?;
        let mut tail = vec![0u8; (footer_start - index_offset) as usize];
        file.read_exact(&mut tail)?;

        let (index_bytes, meta_bytes) = tail.split_at((meta_offset - index_offset) as usize);
        let index = parse_index(index_bytes, index_offset)?;
        let meta = parse_meta(meta_bytes)?;

        if meta.entry_count != entry_count || meta.encoding != encoding {
            return Err(HistError::Corruption(
                "archive header disagrees with stored metadata".to_string(),
            ));
        }
        if meta.block_count != index.len() as u64 {
            return Err(HistError::Corruption(format!(
                "metadata names {} blocks, index holds {}",
                meta.block_count,
                index.len()
            )));
        }

        debug!(
            path = %path.display(),
            entries = entry_count,
            blocks = index.len(),
            "Archive opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            encoding,
            records_per_block,
            index_offset,
            data_crc,
            index: index.into(),
            meta,
            stats: Arc::new(SessionStats::default()),
        })
    }

    /// Recompute the data checksum and compare it with the footer
    pub fn verify(&self) -> Result<()> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(HEADER_SIZE))?;

        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = self.index_offset - HEADER_SIZE;
        let mut chunk = vec![0u8; VERIFY_CHUNK];
        while remaining > 0 {
            let len = remaining.min(VERIFY_CHUNK as u64) as usize;
            file.read_exact(&mut chunk[..len])?;
            hasher.update(&chunk[..len]);
            remaining -= len as u64;
        }

        let actual = hasher.finalize();
        if actual != self.data_crc {
            warn!(
                path = %self.path.display(),
                expected = self.data_crc,
                actual,
                "Archive checksum mismatch"
            );
            return Err(HistError::Corruption(format!(
                "data checksum mismatch: expected {:08x}, got {:08x}",
                self.data_crc, actual
            )));
        }
        Ok(())
    }

    pub fn meta(&self) -> &ArchiveMeta {
        &self.meta
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> EncodingDefinition {
        self.encoding
    }

    pub fn records_per_block(&self) -> u32 {
        self.records_per_block
    }

    pub fn entry_count(&self) -> u64 {
        self.meta.entry_count
    }

    /// Session and cursor counters
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

fn parse_index(bytes: &[u8], index_offset: u64) -> Result<Vec<BlockHandle>> {
    let mut input = bytes;
    let count = get_u32_le(&mut input)? as u64;
    if input.len() as u64 != count * INDEX_ENTRY_SIZE {
        return Err(HistError::Corruption(format!(
            "index holds {} bytes for {} blocks",
            input.len(),
            count
        )));
    }

    let mut index = Vec::with_capacity(count as usize);
    let mut previous: Option<BlockHandle> = None;
    for _ in 0..count {
        let timestamp = get_u64_le(&mut input)?;
        let point_id = get_u64_le(&mut input)?;
        let offset = get_u64_le(&mut input)?;
        let handle = BlockHandle {
            first_key: HistorianKey::new(timestamp, point_id),
            offset,
        };

        let ordered = previous.map_or(offset >= HEADER_SIZE, |prev| {
            prev.first_key < handle.first_key && prev.offset < offset
        });
        if !ordered || offset >= index_offset {
            return Err(HistError::Corruption(format!(
                "index entry {} at offset {} is out of order",
                handle.first_key, offset
            )));
        }
        previous = Some(handle);
        index.push(handle);
    }
    Ok(index)
}

fn parse_meta(bytes: &[u8]) -> Result<ArchiveMeta> {
    let mut input = bytes;
    let len = get_u32_le(&mut input)? as usize;
    if input.len() != len {
        return Err(HistError::Corruption(format!(
            "metadata length {} does not match {} stored bytes",
            len,
            input.len()
        )));
    }
    Ok(bincode::deserialize(input)?)
}

// =============================================================================
// Engine
// =============================================================================

impl SortedTreeEngine for ArchiveFile {
    fn open_reader(&self) -> Result<Box<dyn EngineReader>> {
        Ok(Box::new(ArchiveReader {
            path: self.path.clone(),
            encoding: self.encoding,
            index: Arc::clone(&self.index),
            data_end: self.index_offset,
            session: SessionGuard::new(Arc::clone(&self.stats)),
        }))
    }
}

struct ArchiveReader {
    path: PathBuf,
    encoding: EncodingDefinition,
    index: Arc<[BlockHandle]>,
    data_end: u64,
    session: SessionGuard,
}

impl EngineReader for ArchiveReader {
    fn read(&mut self, options: &ReaderOptions, filters: ScanFilters) -> Result<Box<dyn TreeStream>> {
        let file = BufReader::new(File::open(&self.path)?);
        let source = BlockSource::new(
            file,
            Arc::clone(&self.index),
            self.encoding.reader(),
            self.data_end,
        );
        let guard = CursorGuard::new(Arc::clone(self.session.stats()));
        Ok(Box::new(FilteredCursor::new(source, guard, filters, *options)))
    }
}
