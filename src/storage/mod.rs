//! Storage Module
//!
//! The sorted-tree engine contract the query layer consumes, plus two
//! reference engines.
//!
//! ## Contract
//! ```text
//! SortedTreeEngine::open_reader()  ──►  EngineReader   (read session)
//! EngineReader::read(options, filters)  ──►  TreeStream (ascending cursor)
//! TreeStream::read() / current_key() / current_value() / cancel()
//! ```
//!
//! A cursor owns everything it needs (snapshot or file handle), so it may
//! outlive the call that created it. Seek windows, key matching and value
//! matching are all applied inside the cursor.
//!
//! ## Engines
//! - `MemoryArchive`: copy-on-write `BTreeMap` snapshots
//! - `ArchiveFile`:   immutable block-compressed file written by `ArchiveWriter`

mod archive;
mod cursor;
mod memory;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::filters::ScanFilters;
use crate::model::{HistorianKey, HistorianValue};

pub use archive::{ArchiveFile, ArchiveMeta, ArchiveWriter};
pub use memory::MemoryArchive;

// =============================================================================
// Engine Contract
// =============================================================================

/// Forward-only cursor over ascending (key, value) records.
pub trait TreeStream: Send {
    /// Advance once. `Ok(false)` marks the end of the sequence; the current
    /// key and value are meaningless afterwards.
    fn read(&mut self) -> Result<bool>;

    fn current_key(&self) -> &HistorianKey;

    fn current_value(&self) -> &HistorianValue;

    /// Stop early and release engine resources held by the cursor
    fn cancel(&mut self);
}

/// A read session (snapshot) on an engine.
///
/// Dropping the reader releases the session.
pub trait EngineReader: Send {
    fn read(&mut self, options: &ReaderOptions, filters: ScanFilters) -> Result<Box<dyn TreeStream>>;
}

pub trait SortedTreeEngine: Send + Sync {
    fn open_reader(&self) -> Result<Box<dyn EngineReader>>;
}

// =============================================================================
// Reader Options
// =============================================================================

/// Per-scan limits. Reaching a limit ends the sequence; it is not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Stop after this many records have been returned
    pub max_return_count: Option<u64>,
    /// Stop after this many records inside seek windows have been examined
    pub max_scan_count: Option<u64>,
}

impl ReaderOptions {
    pub fn with_max_return_count(mut self, count: u64) -> Self {
        self.max_return_count = Some(count);
        self
    }

    pub fn with_max_scan_count(mut self, count: u64) -> Self {
        self.max_scan_count = Some(count);
        self
    }

    pub(crate) fn exhausted(&self, returned: u64, scanned: u64) -> bool {
        self.max_return_count.map_or(false, |max| returned >= max)
            || self.max_scan_count.map_or(false, |max| scanned >= max)
    }
}

// =============================================================================
// Session Accounting
// =============================================================================

/// Counters shared by an engine and every session/cursor it hands out.
///
/// Counts only move forward, so `opened - released` is the number of live
/// sessions at any instant.
#[derive(Debug, Default)]
pub struct SessionStats {
    readers_opened: AtomicU64,
    readers_released: AtomicU64,
    cursors_opened: AtomicU64,
    cursors_released: AtomicU64,
}

impl SessionStats {
    pub fn readers_opened(&self) -> u64 {
        self.readers_opened.load(Ordering::SeqCst)
    }

    pub fn readers_released(&self) -> u64 {
        self.readers_released.load(Ordering::SeqCst)
    }

    pub fn active_readers(&self) -> u64 {
        self.readers_opened() - self.readers_released()
    }

    pub fn cursors_opened(&self) -> u64 {
        self.cursors_opened.load(Ordering::SeqCst)
    }

    pub fn active_cursors(&self) -> u64 {
        self.cursors_opened() - self.cursors_released.load(Ordering::SeqCst)
    }
}

/// Held by a read session; counts one release when dropped.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    stats: Arc<SessionStats>,
}

impl SessionGuard {
    pub(crate) fn new(stats: Arc<SessionStats>) -> Self {
        stats.readers_opened.fetch_add(1, Ordering::SeqCst);
        Self { stats }
    }

    pub(crate) fn stats(&self) -> &Arc<SessionStats> {
        &self.stats
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.stats.readers_released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Held by a cursor until it finishes or is cancelled.
#[derive(Debug)]
pub(crate) struct CursorGuard {
    stats: Arc<SessionStats>,
}

impl CursorGuard {
    pub(crate) fn new(stats: Arc<SessionStats>) -> Self {
        stats.cursors_opened.fetch_add(1, Ordering::SeqCst);
        Self { stats }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.stats.cursors_released.fetch_add(1, Ordering::SeqCst);
    }
}
