//! Point stream
//!
//! Pairs an engine read session with the cursor it produced so both are
//! released together, cursor first.

use tracing::trace;

use crate::error::Result;
use crate::filters::ScanFilters;
use crate::model::{HistorianKey, HistorianValue};
use crate::storage::{EngineReader, ReaderOptions, TreeStream};

/// Forward-only stream of (key, value) records owning its read session.
///
/// Dropping the stream (or calling `close()`) cancels the cursor and then
/// releases the reader, on every exit path, exactly once.
pub struct PointStream {
    stream: Box<dyn TreeStream>,
    /// `None` once released
    reader: Option<Box<dyn EngineReader>>,
    valid: bool,
}

impl PointStream {
    pub fn new(reader: Box<dyn EngineReader>, stream: Box<dyn TreeStream>) -> Self {
        Self {
            stream,
            reader: Some(reader),
            valid: false,
        }
    }

    /// Start a scan on an already opened read session.
    ///
    /// The stream takes ownership of `reader`. If the scan cannot start the
    /// reader is dropped before the error is returned.
    pub fn open(
        mut reader: Box<dyn EngineReader>,
        options: &ReaderOptions,
        filters: ScanFilters,
    ) -> Result<Self> {
        let stream = reader.read(options, filters)?;
        Ok(Self::new(reader, stream))
    }

    /// Advance once. Returns `false` at the end of the sequence or after
    /// the stream has been released.
    pub fn read(&mut self) -> Result<bool> {
        if self.reader.is_none() {
            self.valid = false;
            return Ok(false);
        }
        match self.stream.read() {
            Ok(advanced) => {
                self.valid = advanced;
                Ok(advanced)
            }
            Err(e) => {
                self.valid = false;
                Err(e)
            }
        }
    }

    /// True while positioned on a record
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Key of the current record; meaningless unless `is_valid()`
    pub fn current_key(&self) -> &HistorianKey {
        self.stream.current_key()
    }

    pub fn current_value(&self) -> &HistorianValue {
        self.stream.current_value()
    }

    /// Release the cursor and the reader now
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.valid = false;
            self.stream.cancel();
            drop(reader);
            trace!("Point stream released");
        }
    }
}

impl TreeStream for PointStream {
    fn read(&mut self) -> Result<bool> {
        PointStream::read(self)
    }

    fn current_key(&self) -> &HistorianKey {
        PointStream::current_key(self)
    }

    fn current_value(&self) -> &HistorianValue {
        PointStream::current_value(self)
    }

    fn cancel(&mut self) {
        self.release();
    }
}

impl Drop for PointStream {
    fn drop(&mut self) {
        self.release();
    }
}
