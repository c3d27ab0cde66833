//! Archive Module
//!
//! Immutable on-disk sorted record file, block-compressed with the codec
//! pair named in its header.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (20 bytes)                                            │
//! │   Magic "HIST" (4) | Version u16 (2) | Count u64 (8)         │
//! │   KeyTag u8 (1) | ValueTag u8 (1) | RecordsPerBlock u32 (4)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Data Blocks (variable)                                       │
//! │   [Records: u32][ByteLen: u32][compressed records]           │
//! │   delta chain restarts at every block                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Sparse Index                                                 │
//! │   [Blocks: u32] then per block                               │
//! │   [Timestamp: u64][PointId: u64][Offset: u64]                │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Meta                                                         │
//! │   [Len: u32][bincode ArchiveMeta]                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Footer (24 bytes)                                            │
//! │   IndexOffset u64 | MetaOffset u64 | DataCRC u32 | Pad (4)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod cursor;
mod file;
mod writer;

use serde::{Deserialize, Serialize};

use crate::encoding::EncodingDefinition;
use crate::model::HistorianKey;

pub use file::ArchiveFile;
pub use writer::ArchiveWriter;

// =============================================================================
// Shared Constants
// =============================================================================

pub(crate) const MAGIC: &[u8; 4] = b"HIST";

pub(crate) const VERSION: u16 = 1;

/// Magic (4) + Version (2) + EntryCount (8) + KeyTag (1) + ValueTag (1) + RecordsPerBlock (4)
pub(crate) const HEADER_SIZE: u64 = 20;

/// Offset of the entry count rewritten by `finish()`
pub(crate) const ENTRY_COUNT_OFFSET: u64 = 6;

/// IndexOffset (8) + MetaOffset (8) + DataCRC (4) + Padding (4)
pub(crate) const FOOTER_SIZE: u64 = 24;

/// Records (4) + ByteLen (4)
pub(crate) const BLOCK_HEADER_SIZE: u64 = 8;

/// Timestamp (8) + PointId (8) + Offset (8)
pub(crate) const INDEX_ENTRY_SIZE: u64 = 24;

// =============================================================================
// Archive Metadata
// =============================================================================

/// Summary stored after the index and returned by `ArchiveWriter::finish`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMeta {
    pub entry_count: u64,
    pub block_count: u64,
    pub first_key: Option<HistorianKey>,
    pub last_key: Option<HistorianKey>,
    pub encoding: EncodingDefinition,
}

impl ArchiveMeta {
    /// Quick check if a key falls inside the stored key range
    pub fn might_contain(&self, key: &HistorianKey) -> bool {
        match (self.first_key, self.last_key) {
            (Some(first), Some(last)) => *key >= first && *key <= last,
            _ => false,
        }
    }
}

/// One sparse index entry: first key of a block and the block's offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockHandle {
    pub first_key: HistorianKey,
    pub offset: u64,
}
