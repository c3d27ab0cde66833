//! In-memory archive
//!
//! `BTreeMap`-based sorted store. Readers take an `Arc` snapshot of the map;
//! inserts clone-on-write only while a snapshot is alive, so scans never
//! block writers and never observe a half-applied batch.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::archive::{ArchiveMeta, ArchiveWriter};
use super::cursor::{FilteredCursor, SortedSource};
use super::{
    CursorGuard, EngineReader, ReaderOptions, SessionGuard, SessionStats, SortedTreeEngine,
    TreeStream,
};
use crate::config::Config;
use crate::error::Result;
use crate::filters::ScanFilters;
use crate::model::{HistorianKey, HistorianValue};

type Snapshot = Arc<BTreeMap<HistorianKey, HistorianValue>>;

/// Sorted in-memory engine
#[derive(Debug, Default)]
pub struct MemoryArchive {
    data: RwLock<Snapshot>,
    stats: Arc<SessionStats>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one record
    pub fn insert(&self, key: HistorianKey, value: HistorianValue) {
        let mut data = self.data.write();
        Arc::make_mut(&mut data).insert(key, value);
    }

    /// Insert a batch under one write lock
    pub fn extend<I>(&self, records: I)
    where
        I: IntoIterator<Item = (HistorianKey, HistorianValue)>,
    {
        let mut data = self.data.write();
        Arc::make_mut(&mut data).extend(records);
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Session and cursor counters
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Write the current contents to an archive file
    pub fn flush_to(&self, path: &Path, config: &Config) -> Result<ArchiveMeta> {
        let snapshot = Arc::clone(&*self.data.read());

        let mut writer = ArchiveWriter::create(path, config)?;
        for (key, value) in snapshot.iter() {
            writer.add(key, value)?;
        }
        let meta = writer.finish()?;

        debug!(
            path = %path.display(),
            entries = meta.entry_count,
            "Flushed memory archive"
        );
        Ok(meta)
    }
}

impl SortedTreeEngine for MemoryArchive {
    fn open_reader(&self) -> Result<Box<dyn EngineReader>> {
        let snapshot = Arc::clone(&*self.data.read());
        Ok(Box::new(MemoryReader {
            snapshot,
            session: SessionGuard::new(Arc::clone(&self.stats)),
        }))
    }
}

/// Read session pinned to one snapshot
struct MemoryReader {
    snapshot: Snapshot,
    session: SessionGuard,
}

impl EngineReader for MemoryReader {
    fn read(&mut self, options: &ReaderOptions, filters: ScanFilters) -> Result<Box<dyn TreeStream>> {
        let source = SnapshotSource {
            snapshot: Arc::clone(&self.snapshot),
            position: Bound::Unbounded,
        };
        let guard = CursorGuard::new(Arc::clone(self.session.stats()));
        Ok(Box::new(FilteredCursor::new(source, guard, filters, *options)))
    }
}

/// Walks a snapshot by re-seeking past the last returned key
struct SnapshotSource {
    snapshot: Snapshot,
    position: Bound<HistorianKey>,
}

impl SortedSource for SnapshotSource {
    fn seek(&mut self, key: &HistorianKey) -> Result<()> {
        let behind = match self.position {
            Bound::Unbounded => true,
            Bound::Included(current) | Bound::Excluded(current) => current < *key,
        };
        if behind {
            self.position = Bound::Included(*key);
        }
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<(HistorianKey, HistorianValue)>> {
        let next = self
            .snapshot
            .range((self.position, Bound::Unbounded))
            .next()
            .map(|(key, value)| (*key, *value));

        if let Some((key, _)) = next {
            self.position = Bound::Excluded(key);
        }
        Ok(next)
    }
}
