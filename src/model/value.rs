//! Historian value

use serde::{Deserialize, Serialize};

/// Measurement payload attached to a key.
///
/// Equality compares the raw bit pattern of `value`, so a NaN written to an
/// archive compares equal to the NaN read back.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HistorianValue {
    /// Measured value
    pub value: f64,
    /// Quality and state flags
    pub quality: u32,
}

impl HistorianValue {
    pub fn new(value: f64, quality: u32) -> Self {
        Self { value, quality }
    }

    /// Snapshot this value for inclusion in a frame
    pub fn to_struct(&self) -> ValueStruct {
        ValueStruct {
            value: self.value,
            quality: self.quality,
        }
    }
}

impl PartialEq for HistorianValue {
    fn eq(&self, other: &Self) -> bool {
        self.value.to_bits() == other.value.to_bits() && self.quality == other.quality
    }
}

impl Eq for HistorianValue {}

/// Immutable copy of a value as stored in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueStruct {
    pub value: f64,
    pub quality: u32,
}
