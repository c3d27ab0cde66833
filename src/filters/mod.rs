//! Filters Module
//!
//! The three filter roles a scan consults, each persisted as a one-byte
//! tag followed by a tag-specific payload.
//!
//! ## Roles
//! - **Seek** (`SeekFilter`): ascending key windows; whole regions outside
//!   every window are skipped without touching records.
//! - **Match** (`MatchFilter`): per-key predicate, applied to every key
//!   inside a window.
//! - **Value match** (`ValueMatchFilter`): per-value predicate, applied only
//!   after the key matched.
//!
//! ## Tags
//! ```text
//! Seek:   0x00 all | 0x01 timestamp ranges | 0x02 timestamp intervals
//! Match:  0x00 all | 0x01 point id bitmap  | 0x02 point id hash set
//! Value:  0x00 all | 0x01 quality mask     | 0x02 value range
//! ```
//!
//! Loading reads the tag once and constructs the matching variant. An
//! unknown tag is an error, never "no filter".

mod point_id;
mod timestamp;
mod value;

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::encoding::varint::get_u8;
use crate::error::{HistError, Result};
use crate::model::{HistorianKey, HistorianValue};

pub use point_id::{PointIdFilter, BIT_ARRAY_THRESHOLD, TAG_BIT_ARRAY, TAG_HASH_SET};
pub use timestamp::{KeyWindow, SeekWindows, TimestampFilter, TAG_INTERVALS, TAG_RANGES};
pub use value::{ValueFilter, TAG_QUALITY_MASK, TAG_RANGE};

/// Tag shared by the pass-everything variant of each role
pub const TAG_ALL: u8 = 0x00;

// =============================================================================
// Seek Filter
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeekFilter {
    /// One window over the whole key space
    #[default]
    All,
    Timestamps(TimestampFilter),
}

impl SeekFilter {
    pub fn windows(&self) -> SeekWindows {
        match self {
            SeekFilter::All => SeekWindows::everything(),
            SeekFilter::Timestamps(filter) => filter.windows(),
        }
    }

    pub fn save(&self, out: &mut BytesMut) -> Result<()> {
        match self {
            SeekFilter::All => {
                out.put_u8(TAG_ALL);
                Ok(())
            }
            SeekFilter::Timestamps(filter) => filter.save(out),
        }
    }

    pub fn load(input: &mut &[u8]) -> Result<Self> {
        let tag = get_u8(input)?;
        trace!(tag, "Loading seek filter");
        match tag {
            TAG_ALL => Ok(SeekFilter::All),
            TAG_RANGES | TAG_INTERVALS => Ok(SeekFilter::Timestamps(
                TimestampFilter::load_payload(tag, input)?,
            )),
            tag => Err(HistError::UnsupportedFormat {
                kind: "seek filter",
                tag,
            }),
        }
    }
}

impl From<TimestampFilter> for SeekFilter {
    fn from(filter: TimestampFilter) -> Self {
        SeekFilter::Timestamps(filter)
    }
}

// =============================================================================
// Match Filter
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MatchFilter {
    #[default]
    All,
    PointIds(PointIdFilter),
}

impl MatchFilter {
    pub fn contains(&self, key: &HistorianKey) -> bool {
        match self {
            MatchFilter::All => true,
            MatchFilter::PointIds(filter) => filter.contains(key.point_id),
        }
    }

    pub fn save(&self, out: &mut BytesMut) -> Result<()> {
        match self {
            MatchFilter::All => {
                out.put_u8(TAG_ALL);
                Ok(())
            }
            MatchFilter::PointIds(filter) => filter.save(out),
        }
    }

    pub fn load(input: &mut &[u8]) -> Result<Self> {
        let tag = get_u8(input)?;
        trace!(tag, "Loading match filter");
        match tag {
            TAG_ALL => Ok(MatchFilter::All),
            TAG_BIT_ARRAY | TAG_HASH_SET => Ok(MatchFilter::PointIds(
                PointIdFilter::load_payload(tag, input)?,
            )),
            tag => Err(HistError::UnsupportedFormat {
                kind: "match filter",
                tag,
            }),
        }
    }
}

impl From<PointIdFilter> for MatchFilter {
    fn from(filter: PointIdFilter) -> Self {
        MatchFilter::PointIds(filter)
    }
}

// =============================================================================
// Value Match Filter
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ValueMatchFilter {
    #[default]
    All,
    Value(ValueFilter),
}

impl ValueMatchFilter {
    pub fn contains(&self, value: &HistorianValue) -> bool {
        match self {
            ValueMatchFilter::All => true,
            ValueMatchFilter::Value(filter) => filter.contains(value),
        }
    }

    pub fn save(&self, out: &mut BytesMut) -> Result<()> {
        match self {
            ValueMatchFilter::All => {
                out.put_u8(TAG_ALL);
                Ok(())
            }
            ValueMatchFilter::Value(filter) => filter.save(out),
        }
    }

    pub fn load(input: &mut &[u8]) -> Result<Self> {
        let tag = get_u8(input)?;
        trace!(tag, "Loading value filter");
        match tag {
            TAG_ALL => Ok(ValueMatchFilter::All),
            TAG_QUALITY_MASK | TAG_RANGE => Ok(ValueMatchFilter::Value(
                ValueFilter::load_payload(tag, input)?,
            )),
            tag => Err(HistError::UnsupportedFormat {
                kind: "value filter",
                tag,
            }),
        }
    }
}

impl From<ValueFilter> for ValueMatchFilter {
    fn from(filter: ValueFilter) -> Self {
        ValueMatchFilter::Value(filter)
    }
}

// =============================================================================
// Scan Filters
// =============================================================================

/// The filter triple handed to an engine scan
#[derive(Debug, Clone, Default)]
pub struct ScanFilters {
    pub seek: SeekFilter,
    pub key_match: MatchFilter,
    pub value_match: ValueMatchFilter,
}

impl ScanFilters {
    pub fn new(seek: SeekFilter, key_match: MatchFilter, value_match: ValueMatchFilter) -> Self {
        Self {
            seek,
            key_match,
            value_match,
        }
    }

    /// Key and value predicates combined, for records inside a window
    pub fn accepts(&self, key: &HistorianKey, value: &HistorianValue) -> bool {
        self.key_match.contains(key) && self.value_match.contains(value)
    }
}
