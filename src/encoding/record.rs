//! Stateful record writer/reader
//!
//! Holds the "previous record" slots a delta codec needs. One instance per
//! stream; clone before handing a stream to a second cursor.

use bytes::BytesMut;

use super::DoubleValueEncoding;
use crate::error::Result;
use crate::model::{HistorianKey, HistorianValue};

type RecordEncoding = Box<dyn DoubleValueEncoding<HistorianKey, HistorianValue>>;

/// Appends compressed records to a buffer, tracking the previous record.
#[derive(Clone)]
pub struct RecordWriter {
    encoding: RecordEncoding,
    prev_key: HistorianKey,
    prev_value: HistorianValue,
}

impl RecordWriter {
    pub fn new(encoding: RecordEncoding) -> Self {
        Self {
            encoding,
            prev_key: HistorianKey::default(),
            prev_value: HistorianValue::default(),
        }
    }

    /// Append one record and return the number of bytes written.
    ///
    /// # Panics
    /// If the codec emits more than its declared `max_compression_size`.
    /// Every reader sizes buffers from that bound, so a codec that breaks it
    /// cannot be trusted for any later record either.
    pub fn write(&mut self, out: &mut BytesMut, key: &HistorianKey, value: &HistorianValue) -> usize {
        let max = self.encoding.max_compression_size();
        out.reserve(max);

        let before = out.len();
        self.encoding
            .compress(out, &self.prev_key, &self.prev_value, key, value);
        let written = out.len() - before;

        assert!(
            written <= max,
            "codec wrote {} bytes for record {}, declared maximum is {}",
            written,
            key,
            max
        );

        self.prev_key = *key;
        self.prev_value = *value;
        written
    }

    /// Forget the previous record (start of a new block)
    pub fn reset(&mut self) {
        self.prev_key = HistorianKey::default();
        self.prev_value = HistorianValue::default();
    }

    pub fn max_record_size(&self) -> usize {
        self.encoding.max_compression_size()
    }
}

/// Decodes records written by a [`RecordWriter`] with the same encoding.
#[derive(Clone)]
pub struct RecordReader {
    encoding: RecordEncoding,
    prev_key: HistorianKey,
    prev_value: HistorianValue,
}

impl RecordReader {
    pub fn new(encoding: RecordEncoding) -> Self {
        Self {
            encoding,
            prev_key: HistorianKey::default(),
            prev_value: HistorianValue::default(),
        }
    }

    /// Decode the next record from `input` into `key`/`value`
    pub fn read(
        &mut self,
        input: &mut &[u8],
        key: &mut HistorianKey,
        value: &mut HistorianValue,
    ) -> Result<()> {
        self.encoding
            .decompress(input, &self.prev_key, &self.prev_value, key, value)?;
        self.prev_key = *key;
        self.prev_value = *value;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.prev_key = HistorianKey::default();
        self.prev_value = HistorianValue::default();
    }
}
