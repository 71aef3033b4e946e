//! DER definite-length encoding.
//!
//! - 0..=127: one byte
//! - larger: `0x80 | n` followed by `n` big-endian bytes, `n` in 1..=4

use bytes::BufMut;

use super::CodecError;

/// Longest length-of-length written or accepted
pub const MAX_LENGTH_OCTETS: usize = 4;

/// Number of bytes the encoding of `len` takes.
pub fn der_length_size(len: usize) -> usize {
    if len < 0x80 {
        1
    } else {
        1 + significant_bytes(len)
    }
}

fn significant_bytes(len: usize) -> usize {
    let bits = usize::BITS - len.leading_zeros();
    bits.div_ceil(8) as usize
}

/// Append the encoding of `len`.
///
/// Lengths needing more than [`MAX_LENGTH_OCTETS`] bytes are refused so
/// that every written length can be read back.
pub fn write_der_length(buf: &mut Vec<u8>, len: usize) -> Result<(), CodecError> {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return Ok(());
    }
    let n = significant_bytes(len);
    if n > MAX_LENGTH_OCTETS {
        return Err(CodecError::BadLength);
    }
    buf.put_u8(0x80 | n as u8);
    for i in (0..n).rev() {
        buf.put_u8((len >> (8 * i)) as u8);
    }
    Ok(())
}

/// Read a length, returning `(length, bytes_consumed)`.
pub fn read_der_length(data: &[u8]) -> Result<(usize, usize), CodecError> {
    super::need(data, 1)?;
    let first = data[0];
    if first < 0x80 {
        return Ok((first as usize, 1));
    }

    let n = (first & 0x7F) as usize;
    if n == 0 || n > MAX_LENGTH_OCTETS {
        return Err(CodecError::BadLength);
    }
    super::need(data, 1 + n)?;

    let len = data[1..=n]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((len, 1 + n))
}
