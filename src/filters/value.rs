//! Value match filter
//!
//! Decides inclusion of a record whose key already matched. Never prunes
//! seek windows.

use bytes::{BufMut, BytesMut};

use crate::encoding::varint::{get_f64_le, get_u32_le};
use crate::error::{HistError, Result};
use crate::model::HistorianValue;

pub const TAG_QUALITY_MASK: u8 = 0x01;
pub const TAG_RANGE: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueFilter {
    /// Drop values whose quality shares any bit with `mask`
    QualityMask { mask: u32 },
    /// Keep values in `[min, max]`; NaN never matches
    Range { min: f64, max: f64 },
}

impl ValueFilter {
    pub fn exclude_quality(mask: u32) -> Self {
        ValueFilter::QualityMask { mask }
    }

    pub fn range(min: f64, max: f64) -> Result<Self> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(HistError::InvalidArgument(format!(
                "value range [{}, {}] is empty or undefined",
                min, max
            )));
        }
        Ok(ValueFilter::Range { min, max })
    }

    pub fn contains(&self, value: &HistorianValue) -> bool {
        match *self {
            ValueFilter::QualityMask { mask } => value.quality & mask == 0,
            ValueFilter::Range { min, max } => value.value >= min && value.value <= max,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            ValueFilter::QualityMask { .. } => TAG_QUALITY_MASK,
            ValueFilter::Range { .. } => TAG_RANGE,
        }
    }

    pub fn save(&self, out: &mut BytesMut) -> Result<()> {
        out.put_u8(self.tag());
        match *self {
            ValueFilter::QualityMask { mask } => out.put_u32_le(mask),
            ValueFilter::Range { min, max } => {
                out.put_f64_le(min);
                out.put_f64_le(max);
            }
        }
        Ok(())
    }

    pub fn load_payload(tag: u8, input: &mut &[u8]) -> Result<Self> {
        match tag {
            TAG_QUALITY_MASK => Ok(ValueFilter::QualityMask {
                mask: get_u32_le(input)?,
            }),
            TAG_RANGE => {
                let min = get_f64_le(input)?;
                let max = get_f64_le(input)?;
                Self::range(min, max)
            }
            tag => Err(HistError::UnsupportedFormat {
                kind: "value filter",
                tag,
            }),
        }
    }
}
