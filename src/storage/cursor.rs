//! Filtered cursor
//!
//! Drives any ascending record source through seek windows, the key match
//! filter and the value match filter. Both reference engines plug their
//! own `SortedSource` in here.

use tracing::trace;

use super::{CursorGuard, ReaderOptions, TreeStream};
use crate::error::Result;
use crate::filters::{KeyWindow, ScanFilters, SeekWindows};
use crate::model::{HistorianKey, HistorianValue};

/// Ascending record source that can only move forward.
pub(crate) trait SortedSource: Send {
    /// Position at the first record `>= key`. Never moves backwards.
    fn seek(&mut self, key: &HistorianKey) -> Result<()>;

    fn next_record(&mut self) -> Result<Option<(HistorianKey, HistorianValue)>>;
}

pub(crate) struct FilteredCursor<S: SortedSource> {
    /// `None` once finished or cancelled; dropping it releases the source
    source: Option<S>,
    guard: Option<CursorGuard>,
    filters: ScanFilters,
    options: ReaderOptions,
    windows: SeekWindows,
    window: Option<KeyWindow>,
    /// Record read past the end of the previous window
    pending: Option<(HistorianKey, HistorianValue)>,
    returned: u64,
    scanned: u64,
    key: HistorianKey,
    value: HistorianValue,
}

impl<S: SortedSource> FilteredCursor<S> {
    pub(crate) fn new(
        source: S,
        guard: CursorGuard,
        filters: ScanFilters,
        options: ReaderOptions,
    ) -> Self {
        let windows = filters.seek.windows();
        Self {
            source: Some(source),
            guard: Some(guard),
            filters,
            options,
            windows,
            window: None,
            pending: None,
            returned: 0,
            scanned: 0,
            key: HistorianKey::default(),
            value: HistorianValue::default(),
        }
    }

    fn advance(&mut self) -> Result<bool> {
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return Ok(false),
        };

        loop {
            if self.options.exhausted(self.returned, self.scanned) {
                return Ok(false);
            }

            let window = match self.window {
                Some(window) => window,
                None => {
                    let window = match self.windows.next() {
                        Some(window) => window,
                        None => return Ok(false),
                    };
                    match self.pending {
                        Some((key, _)) if key >= window.start => {}
                        _ => {
                            self.pending = None;
                            source.seek(&window.start)?;
                        }
                    }
                    self.window = Some(window);
                    window
                }
            };

            let (key, value) = match self.pending.take() {
                Some(record) => record,
                None => match source.next_record()? {
                    Some(record) => record,
                    None => return Ok(false),
                },
            };

            if key > window.stop {
                self.pending = Some((key, value));
                self.window = None;
                continue;
            }
            if key < window.start {
                continue;
            }

            self.scanned += 1;
            if self.filters.accepts(&key, &value) {
                self.key = key;
                self.value = value;
                self.returned += 1;
                return Ok(true);
            }
        }
    }

    fn finish(&mut self) {
        if self.source.take().is_some() {
            trace!(
                returned = self.returned,
                scanned = self.scanned,
                "Cursor finished"
            );
        }
        self.pending = None;
        self.guard = None;
    }
}

impl<S: SortedSource> TreeStream for FilteredCursor<S> {
    fn read(&mut self) -> Result<bool> {
        match self.advance() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.finish();
                Ok(false)
            }
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    fn current_key(&self) -> &HistorianKey {
        &self.key
    }

    fn current_value(&self) -> &HistorianValue {
        &self.value
    }

    fn cancel(&mut self) {
        self.finish();
    }
}
