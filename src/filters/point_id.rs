//! Point identifier match filter
//!
//! ## Persisted Payloads
//! ```text
//! ┌──────────┬────────────────┬──────────┬─────────────────────────────┐
//! │ Tag (1)  │ MaxValue (8)   │ Count (4)│ Items                       │
//! ├──────────┼────────────────┼──────────┼─────────────────────────────┤
//! │ 0x01     │ max point id   │ words    │ count × u64 bitmap words    │
//! │ 0x02     │ max point id   │ points   │ count × u64 point ids       │
//! └──────────┴────────────────┴──────────┴─────────────────────────────┘
//! ```
//! All fields little-endian, no padding. The hash-set layout keeps the
//! max-value field so both layouts share one header.

use std::collections::HashSet;

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::encoding::varint::{ensure, get_u32_le, get_u64_le, get_u8};
use crate::error::{HistError, Result};

pub const TAG_BIT_ARRAY: u8 = 0x01;
pub const TAG_HASH_SET: u8 = 0x02;

/// `from_list` picks the bitmap below this max point id
pub const BIT_ARRAY_THRESHOLD: u64 = 8 * 1024 * 64;

/// Largest max point id a bitmap may be built for
pub const MAX_BIT_ARRAY_VALUE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Points {
    BitArray { max_value: u64, words: Vec<u64> },
    HashSet { max_value: u64, points: HashSet<u64> },
}

/// Membership test over a fixed set of point identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointIdFilter {
    points: Points,
}

impl PointIdFilter {
    /// Choose the layout from the largest identifier
    pub fn from_list(points: impl IntoIterator<Item = u64>) -> Self {
        let points: Vec<u64> = points.into_iter().collect();
        let max_value = points.iter().copied().max().unwrap_or(0);

        if max_value < BIT_ARRAY_THRESHOLD {
            Self::bit_array_unchecked(points, max_value)
        } else {
            Self::hash_set_with_max(points, max_value)
        }
    }

    /// Hash-set layout regardless of identifier range
    pub fn hash_set(points: impl IntoIterator<Item = u64>) -> Self {
        let points: HashSet<u64> = points.into_iter().collect();
        let max_value = points.iter().copied().max().unwrap_or(0);
        Self {
            points: Points::HashSet { max_value, points },
        }
    }

    /// Dense bitmap layout; rejects identifiers above [`MAX_BIT_ARRAY_VALUE`]
    pub fn bit_array(points: impl IntoIterator<Item = u64>) -> Result<Self> {
        let points: Vec<u64> = points.into_iter().collect();
        let max_value = points.iter().copied().max().unwrap_or(0);
        if max_value > MAX_BIT_ARRAY_VALUE {
            return Err(HistError::InvalidArgument(format!(
                "point id {} is too large for a bit array (max {})",
                max_value, MAX_BIT_ARRAY_VALUE
            )));
        }
        Ok(Self::bit_array_unchecked(points, max_value))
    }

    fn bit_array_unchecked(points: Vec<u64>, max_value: u64) -> Self {
        let mut words = vec![0u64; (max_value / 64 + 1) as usize];
        for id in points {
            words[(id / 64) as usize] |= 1u64 << (id % 64);
        }
        Self {
            points: Points::BitArray { max_value, words },
        }
    }

    fn hash_set_with_max(points: Vec<u64>, max_value: u64) -> Self {
        Self {
            points: Points::HashSet {
                max_value,
                points: points.into_iter().collect(),
            },
        }
    }

    pub fn contains(&self, point_id: u64) -> bool {
        match &self.points {
            Points::BitArray { words, .. } => words
                .get((point_id / 64) as usize)
                .map_or(false, |word| word & (1u64 << (point_id % 64)) != 0),
            Points::HashSet { points, .. } => points.contains(&point_id),
        }
    }

    pub fn max_value(&self) -> u64 {
        match &self.points {
            Points::BitArray { max_value, .. } | Points::HashSet { max_value, .. } => *max_value,
        }
    }

    /// Number of distinct identifiers
    pub fn len(&self) -> usize {
        match &self.points {
            Points::BitArray { words, .. } => {
                words.iter().map(|w| w.count_ones() as usize).sum()
            }
            Points::HashSet { points, .. } => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tag(&self) -> u8 {
        match self.points {
            Points::BitArray { .. } => TAG_BIT_ARRAY,
            Points::HashSet { .. } => TAG_HASH_SET,
        }
    }

    /// Write tag + payload. Hash-set ids are written sorted.
    pub fn save(&self, out: &mut BytesMut) -> Result<()> {
        out.put_u8(self.tag());
        out.put_u64_le(self.max_value());
        match &self.points {
            Points::BitArray { words, .. } => {
                out.put_u32_le(count_u32(words.len())?);
                for word in words {
                    out.put_u64_le(*word);
                }
            }
            Points::HashSet { points, .. } => {
                let mut ids: Vec<u64> = points.iter().copied().collect();
                ids.sort_unstable();
                out.put_u32_le(count_u32(ids.len())?);
                for id in ids {
                    out.put_u64_le(id);
                }
            }
        }
        Ok(())
    }

    /// Read a tagged filter, dispatching on the leading tag byte
    pub fn load(input: &mut &[u8]) -> Result<Self> {
        let tag = get_u8(input)?;
        Self::load_payload(tag, input)
    }

    /// Read the payload for an already consumed `tag`
    pub fn load_payload(tag: u8, input: &mut &[u8]) -> Result<Self> {
        match tag {
            TAG_BIT_ARRAY => Self::load_bit_array(tag, input),
            TAG_HASH_SET => Self::load_hash_set(tag, input),
            tag => Err(HistError::UnsupportedFormat {
                kind: "point id filter",
                tag,
            }),
        }
    }

    /// Bitmap loader; fails on any tag but [`TAG_BIT_ARRAY`]
    pub fn load_bit_array(tag: u8, input: &mut &[u8]) -> Result<Self> {
        if tag != TAG_BIT_ARRAY {
            return Err(HistError::UnsupportedFormat {
                kind: "point id bit array",
                tag,
            });
        }
        let max_value = get_u64_le(input)?;
        let count = get_u32_le(input)? as usize;
        if max_value > MAX_BIT_ARRAY_VALUE || count as u64 != max_value / 64 + 1 {
            return Err(HistError::Corruption(format!(
                "bit array of {} words cannot hold max value {}",
                count, max_value
            )));
        }
        ensure(input, count.saturating_mul(8))?;

        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            words.push(get_u64_le(input)?);
        }
        // Bits past max_value in the last word must be clear
        let spare = !0u64 << (max_value % 64) << 1;
        if words.last().map_or(false, |last| last & spare != 0) {
            return Err(HistError::Corruption(format!(
                "bit array sets ids above max value {}",
                max_value
            )));
        }
        debug!(max_value, words = count, "Loaded point id bit array");
        Ok(Self {
            points: Points::BitArray { max_value, words },
        })
    }

    /// Hash-set loader; fails on any tag but [`TAG_HASH_SET`]
    pub fn load_hash_set(tag: u8, input: &mut &[u8]) -> Result<Self> {
        if tag != TAG_HASH_SET {
            return Err(HistError::UnsupportedFormat {
                kind: "point id hash set",
                tag,
            });
        }
        let max_value = get_u64_le(input)?;
        let count = get_u32_le(input)? as usize;
        ensure(input, count.saturating_mul(8))?;

        let mut points = HashSet::with_capacity(count);
        for _ in 0..count {
            points.insert(get_u64_le(input)?);
        }
        debug!(max_value, points = count, "Loaded point id hash set");
        Ok(Self {
            points: Points::HashSet { max_value, points },
        })
    }
}

fn count_u32(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| HistError::InvalidArgument(format!("{} entries exceed u32 count", len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_list_picks_layout() {
        let small = PointIdFilter::from_list([1, 5, 9]);
        assert_eq!(small.tag(), TAG_BIT_ARRAY);

        let large = PointIdFilter::from_list([1, BIT_ARRAY_THRESHOLD]);
        assert_eq!(large.tag(), TAG_HASH_SET);
    }

    #[test]
    fn test_bit_array_membership_edges() {
        let filter = PointIdFilter::bit_array([0, 63, 64, 127]).unwrap();
        for id in [0, 63, 64, 127] {
            assert!(filter.contains(id));
        }
        for id in [1, 62, 65, 128, u64::MAX] {
            assert!(!filter.contains(id));
        }
        assert_eq!(filter.len(), 4);
    }

    #[test]
    fn test_bit_array_rejects_huge_ids() {
        assert!(PointIdFilter::bit_array([MAX_BIT_ARRAY_VALUE + 1]).is_err());
    }

    #[test]
    fn test_hash_set_layout_bytes() {
        let filter = PointIdFilter::hash_set([7, 3]);
        let mut out = BytesMut::new();
        filter.save(&mut out).unwrap();

        let mut expected = vec![TAG_HASH_SET];
        expected.extend_from_slice(&7u64.to_le_bytes());
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(&3u64.to_le_bytes());
        expected.extend_from_slice(&7u64.to_le_bytes());
        assert_eq!(&out[..], expected.as_slice());
    }

    #[test]
    fn test_wrong_tag_loader_fails_loudly() {
        let filter = PointIdFilter::hash_set([1, 2, 3]);
        let mut out = BytesMut::new();
        filter.save(&mut out).unwrap();

        let mut input = &out[1..];
        let result = PointIdFilter::load_bit_array(out[0], &mut input);
        assert!(matches!(
            result,
            Err(HistError::UnsupportedFormat { tag: TAG_HASH_SET, .. })
        ));
    }

    #[test]
    fn test_truncated_hash_set_rejected() {
        let mut out = BytesMut::new();
        PointIdFilter::hash_set([10, 20, 30]).save(&mut out).unwrap();
        let mut input = &out[..out.len() - 4];
        assert!(matches!(
            PointIdFilter::load(&mut input),
            Err(HistError::Truncated { .. })
        ));
    }

    fn bit_array_bytes(max_value: u64, words: &[u64]) -> Vec<u8> {
        let mut bytes = vec![TAG_BIT_ARRAY];
        bytes.extend_from_slice(&max_value.to_le_bytes());
        bytes.extend_from_slice(&(words.len() as u32).to_le_bytes());
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_bit_array_bits_above_max_value_rejected() {
        let bytes = bit_array_bytes(3, &[(1 << 3) | (1 << 10)]);
        let mut input = bytes.as_slice();
        assert!(matches!(
            PointIdFilter::load(&mut input),
            Err(HistError::Corruption(_))
        ));

        let bytes = bit_array_bytes(64, &[1, 1 << 1]);
        let mut input = bytes.as_slice();
        assert!(matches!(
            PointIdFilter::load(&mut input),
            Err(HistError::Corruption(_))
        ));
    }

    #[test]
    fn test_bit_array_full_last_word_loads() {
        let bytes = bit_array_bytes(63, &[u64::MAX]);
        let mut input = bytes.as_slice();
        let filter = PointIdFilter::load(&mut input).unwrap();
        assert!(filter.contains(0));
        assert!(filter.contains(63));
        assert!(!filter.contains(64));
        assert!(input.is_empty());
    }
}
