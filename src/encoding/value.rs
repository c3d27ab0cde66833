//! Value codecs

use bytes::{BufMut, BytesMut};

use super::varint::{get_f64_le, get_u32_le, get_u8, get_uvarint, put_uvarint, MAX_VARINT32_LEN};
use super::SingleValueEncoding;
use crate::error::{HistError, Result};
use crate::model::HistorianValue;

/// Raw 12-byte value: IEEE-754 bits (8, LE) + quality (4, LE).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedValueEncoding;

impl SingleValueEncoding<HistorianValue> for FixedValueEncoding {
    fn uses_previous_value(&self) -> bool {
        false
    }

    fn max_compression_size(&self) -> usize {
        12
    }

    fn compress(&self, out: &mut BytesMut, _prev: &HistorianValue, cur: &HistorianValue) {
        out.put_f64_le(cur.value);
        out.put_u32_le(cur.quality);
    }

    fn decompress(
        &self,
        input: &mut &[u8],
        _prev: &HistorianValue,
        cur: &mut HistorianValue,
    ) -> Result<()> {
        cur.value = get_f64_le(input)?;
        cur.quality = get_u32_le(input)?;
        Ok(())
    }

    fn clone_encoding(&self) -> Box<dyn SingleValueEncoding<HistorianValue>> {
        Box::new(*self)
    }
}

const SIGNIFICANT_MASK: u8 = 0x0F;
const TRAILING_SHIFT: u8 = 4;
const TRAILING_MASK: u8 = 0x07;
const QUALITY_CHANGED: u8 = 0x80;

/// Byte-aligned XOR codec (Gorilla-style, without bit packing).
///
/// ```text
/// ┌─────────────────────────────────────┬───────────────┬──────────────┐
/// │ Header (1)                          │ XOR bytes     │ Quality      │
/// │  bit 7    quality changed           │ (0..=8, LE)   │ (varint, only│
/// │  bits 4-6 trailing zero bytes       │               │  if changed) │
/// │  bits 0-3 significant byte count    │               │              │
/// └─────────────────────────────────────┴───────────────┴──────────────┘
/// ```
///
/// A repeated value with unchanged quality costs one byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct XorValueEncoding;

impl SingleValueEncoding<HistorianValue> for XorValueEncoding {
    fn uses_previous_value(&self) -> bool {
        true
    }

    fn max_compression_size(&self) -> usize {
        1 + 8 + MAX_VARINT32_LEN
    }

    fn compress(&self, out: &mut BytesMut, prev: &HistorianValue, cur: &HistorianValue) {
        let xor = cur.value.to_bits() ^ prev.value.to_bits();

        let (trailing, significant, shifted) = if xor == 0 {
            (0u8, 0u8, 0u64)
        } else {
            // A non-zero u64 has at most 7 whole trailing zero bytes
            let trailing = (xor.trailing_zeros() / 8) as u8;
            let shifted = xor >> (u32::from(trailing) * 8);
            let significant = 8 - (shifted.leading_zeros() / 8) as u8;
            (trailing, significant, shifted)
        };

        let quality_changed = cur.quality != prev.quality;
        let mut header = significant | (trailing << TRAILING_SHIFT);
        if quality_changed {
            header |= QUALITY_CHANGED;
        }

        out.put_u8(header);
        out.put_slice(&shifted.to_le_bytes()[..significant as usize]);
        if quality_changed {
            put_uvarint(out, u64::from(cur.quality));
        }
    }

    fn decompress(
        &self,
        input: &mut &[u8],
        prev: &HistorianValue,
        cur: &mut HistorianValue,
    ) -> Result<()> {
        let header = get_u8(input)?;
        let significant = (header & SIGNIFICANT_MASK) as usize;
        let trailing = u32::from((header >> TRAILING_SHIFT) & TRAILING_MASK);

        if significant > 8 || (significant as u32 + trailing) > 8 {
            return Err(HistError::Corruption(format!(
                "XOR header 0x{:02x} describes more than 8 bytes",
                header
            )));
        }

        let mut raw = [0u8; 8];
        for byte in raw.iter_mut().take(significant) {
            *byte = get_u8(input)?;
        }
        let xor = if significant == 0 {
            0
        } else {
            u64::from_le_bytes(raw) << (trailing * 8)
        };
        cur.value = f64::from_bits(prev.value.to_bits() ^ xor);

        cur.quality = if header & QUALITY_CHANGED != 0 {
            let quality = get_uvarint(input)?;
            u32::try_from(quality).map_err(|_| {
                HistError::Corruption(format!("quality {} does not fit in u32", quality))
            })?
        } else {
            prev.quality
        };
        Ok(())
    }

    fn clone_encoding(&self) -> Box<dyn SingleValueEncoding<HistorianValue>> {
        Box::new(*self)
    }
}
