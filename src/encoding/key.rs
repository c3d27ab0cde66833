//! Key codecs

use bytes::{BufMut, BytesMut};

use super::varint::{get_u64_le, get_uvarint, put_uvarint, unzigzag, zigzag, MAX_VARINT_LEN};
use super::SingleValueEncoding;
use crate::error::Result;
use crate::model::HistorianKey;

/// Raw 16-byte key: timestamp (8, LE) + point id (8, LE).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedKeyEncoding;

impl SingleValueEncoding<HistorianKey> for FixedKeyEncoding {
    fn uses_previous_value(&self) -> bool {
        false
    }

    fn max_compression_size(&self) -> usize {
        16
    }

    fn compress(&self, out: &mut BytesMut, _prev: &HistorianKey, cur: &HistorianKey) {
        out.put_u64_le(cur.timestamp);
        out.put_u64_le(cur.point_id);
    }

    fn decompress(
        &self,
        input: &mut &[u8],
        _prev: &HistorianKey,
        cur: &mut HistorianKey,
    ) -> Result<()> {
        cur.timestamp = get_u64_le(input)?;
        cur.point_id = get_u64_le(input)?;
        Ok(())
    }

    fn clone_encoding(&self) -> Box<dyn SingleValueEncoding<HistorianKey>> {
        Box::new(*self)
    }
}

/// Delta key codec.
///
/// ```text
/// ┌────────────────────────────┬────────────────────────────────────────┐
/// │ zigzag(ts - prev.ts) varint│ same ts:  zigzag(pid - prev.pid) varint│
/// │                            │ new ts:   pid varint                   │
/// └────────────────────────────┴────────────────────────────────────────┘
/// ```
///
/// Subtraction wraps, so any pair of keys round-trips regardless of order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaKeyEncoding;

impl SingleValueEncoding<HistorianKey> for DeltaKeyEncoding {
    fn uses_previous_value(&self) -> bool {
        true
    }

    fn max_compression_size(&self) -> usize {
        2 * MAX_VARINT_LEN
    }

    fn compress(&self, out: &mut BytesMut, prev: &HistorianKey, cur: &HistorianKey) {
        let ts_delta = cur.timestamp.wrapping_sub(prev.timestamp);
        put_uvarint(out, zigzag(ts_delta as i64));

        if ts_delta == 0 {
            let id_delta = cur.point_id.wrapping_sub(prev.point_id);
            put_uvarint(out, zigzag(id_delta as i64));
        } else {
            put_uvarint(out, cur.point_id);
        }
    }

    fn decompress(
        &self,
        input: &mut &[u8],
        prev: &HistorianKey,
        cur: &mut HistorianKey,
    ) -> Result<()> {
        let ts_delta = unzigzag(get_uvarint(input)?) as u64;
        let id_field = get_uvarint(input)?;

        cur.timestamp = prev.timestamp.wrapping_add(ts_delta);
        cur.point_id = if ts_delta == 0 {
            prev.point_id.wrapping_add(unzigzag(id_field) as u64)
        } else {
            id_field
        };
        Ok(())
    }

    fn clone_encoding(&self) -> Box<dyn SingleValueEncoding<HistorianKey>> {
        Box::new(*self)
    }
}
