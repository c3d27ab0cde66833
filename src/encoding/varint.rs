//! Varint and byte-reading helpers shared by the codecs and filter loaders.
//!
//! Readers take `&mut &[u8]` and advance the slice. Every read checks the
//! remaining length first; `bytes::Buf` getters panic on short input.

use bytes::{Buf, BufMut};

use crate::error::{HistError, Result};

/// Longest LEB128 encoding of a u64
pub const MAX_VARINT_LEN: usize = 10;

/// Longest LEB128 encoding of a u32
pub const MAX_VARINT32_LEN: usize = 5;

/// Write an unsigned LEB128 varint
pub fn put_uvarint<B: BufMut>(out: &mut B, mut value: u64) {
    while value >= 0x80 {
        out.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    out.put_u8(value as u8);
}

/// Read an unsigned LEB128 varint
pub fn get_uvarint(input: &mut &[u8]) -> Result<u64> {
    let mut value: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        ensure(input, 1)?;
        let byte = input.get_u8();
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(HistError::Corruption("varint overflows u64".to_string()));
        }
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(HistError::Corruption("varint longer than 10 bytes".to_string()))
}

/// Map signed deltas onto unsigned so small magnitudes stay short
pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Fail with `Truncated` unless `needed` bytes remain
pub fn ensure(input: &&[u8], needed: usize) -> Result<()> {
    if input.remaining() < needed {
        return Err(HistError::Truncated {
            needed: needed - input.remaining(),
        });
    }
    Ok(())
}

pub fn get_u8(input: &mut &[u8]) -> Result<u8> {
    ensure(input, 1)?;
    Ok(input.get_u8())
}

pub fn get_u16_le(input: &mut &[u8]) -> Result<u16> {
    ensure(input, 2)?;
    Ok(input.get_u16_le())
}

pub fn get_u32_le(input: &mut &[u8]) -> Result<u32> {
    ensure(input, 4)?;
    Ok(input.get_u32_le())
}

pub fn get_u64_le(input: &mut &[u8]) -> Result<u64> {
    ensure(input, 8)?;
    Ok(input.get_u64_le())
}

pub fn get_f64_le(input: &mut &[u8]) -> Result<f64> {
    ensure(input, 8)?;
    Ok(input.get_f64_le())
}
