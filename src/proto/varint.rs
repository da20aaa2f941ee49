//! Base-128 variable-length integers.
//!
//! Seven low-order bits per byte, least-significant group first. Every byte
//! except the last has the continuation bit (0x80) set.

use crate::{Error, Result};

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Append the varint encoding of `value` to `buf`.
#[inline]
pub fn put_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value > 0x7F {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Encode `value` into a fresh buffer.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(varint_len(value));
    put_varint(value, &mut buf);
    buf
}

/// Number of bytes `value` occupies once encoded.
#[inline]
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a varint starting at `offset`.
///
/// Returns the value and the offset just past its last byte. Fails with
/// [`Error::TruncatedData`] if `bytes` ends before a byte without the
/// continuation bit, and with [`Error::VarintOverflow`] if the value does not
/// fit in 64 bits.
pub fn decode_varint(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut pos = offset;

    loop {
        let byte = *bytes.get(pos).ok_or(Error::TruncatedData { offset })?;
        pos += 1;

        let low = (byte & 0x7F) as u64;
        if shift == 63 && low > 1 {
            return Err(Error::VarintOverflow { offset });
        }
        result |= low << shift;

        if byte & 0x80 == 0 {
            return Ok((result, pos));
        }

        shift += 7;
        if shift > 63 {
            return Err(Error::VarintOverflow { offset });
        }
    }
}
