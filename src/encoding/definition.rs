//! Encoding selection
//!
//! Names a key/value codec pair by persistable tags so an archive can record
//! which codecs wrote it.

use serde::{Deserialize, Serialize};

use super::{
    CombinedEncoding, DeltaKeyEncoding, FixedKeyEncoding, FixedValueEncoding, RecordReader,
    RecordWriter, SingleValueEncoding, XorValueEncoding,
};
use crate::error::{HistError, Result};
use crate::model::{HistorianKey, HistorianValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyEncodingKind {
    Fixed = 0x01,
    Delta = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueEncodingKind {
    Fixed = 0x01,
    Xor = 0x02,
}

/// A (key codec, value codec) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingDefinition {
    pub key: KeyEncodingKind,
    pub value: ValueEncodingKind,
}

impl EncodingDefinition {
    /// Uncompressed records, 28 bytes each
    pub const FIXED: EncodingDefinition = EncodingDefinition {
        key: KeyEncodingKind::Fixed,
        value: ValueEncodingKind::Fixed,
    };

    /// Delta keys and XOR values
    pub const COMPRESSED: EncodingDefinition = EncodingDefinition {
        key: KeyEncodingKind::Delta,
        value: ValueEncodingKind::Xor,
    };

    pub fn new(key: KeyEncodingKind, value: ValueEncodingKind) -> Self {
        Self { key, value }
    }

    /// Build a fresh codec pair
    pub fn build(&self) -> CombinedEncoding<HistorianKey, HistorianValue> {
        let key: Box<dyn SingleValueEncoding<HistorianKey>> = match self.key {
            KeyEncodingKind::Fixed => Box::new(FixedKeyEncoding),
            KeyEncodingKind::Delta => Box::new(DeltaKeyEncoding),
        };
        let value: Box<dyn SingleValueEncoding<HistorianValue>> = match self.value {
            ValueEncodingKind::Fixed => Box::new(FixedValueEncoding),
            ValueEncodingKind::Xor => Box::new(XorValueEncoding),
        };
        CombinedEncoding::new(key, value)
    }

    pub fn writer(&self) -> RecordWriter {
        RecordWriter::new(Box::new(self.build()))
    }

    pub fn reader(&self) -> RecordReader {
        RecordReader::new(Box::new(self.build()))
    }

    pub fn tags(&self) -> (u8, u8) {
        (self.key as u8, self.value as u8)
    }

    pub fn from_tags(key: u8, value: u8) -> Result<Self> {
        let key = match key {
            0x01 => KeyEncodingKind::Fixed,
            0x02 => KeyEncodingKind::Delta,
            tag => return Err(HistError::UnsupportedFormat { kind: "key encoding", tag }),
        };
        let value = match value {
            0x01 => ValueEncodingKind::Fixed,
            0x02 => ValueEncodingKind::Xor,
            tag => return Err(HistError::UnsupportedFormat { kind: "value encoding", tag }),
        };
        Ok(Self { key, value })
    }
}

impl Default for EncodingDefinition {
    fn default() -> Self {
        Self::COMPRESSED
    }
}
