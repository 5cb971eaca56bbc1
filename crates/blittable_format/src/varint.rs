//! LEB128 variable-length integers.
//!
//! Seven data bits per byte, least significant group first, high bit set on
//! every byte but the last. Signed values are encoded as their
//! two's-complement `u64`, so negative numbers always take ten bytes.

use crate::error::{BlittableError, BlittableResult};

/// Maximum encoded length of a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Encodes `value` into `out`, returning the number of bytes used.
pub fn encode_u64(mut value: u64, out: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut len = 0;
    while value >= 0x80 {
        out[len] = (value as u8) | 0x80;
        value >>= 7;
        len += 1;
    }
    out[len] = value as u8;
    len + 1
}

/// Encodes a signed value as its two's-complement `u64`.
#[allow(clippy::cast_sign_loss)]
pub fn encode_i64(value: i64, out: &mut [u8; MAX_VARINT_LEN]) -> usize {
    encode_u64(value as u64, out)
}

/// Decodes a value starting at `position`, returning it together with the
/// number of bytes consumed.
///
/// # Errors
///
/// Returns [`BlittableError::MalformedVarint`] if the continuation bit is
/// still set after ten bytes or the tenth byte carries bits beyond 64, and
/// [`BlittableError::InvalidFormat`] if the data ends mid-integer.
pub fn decode_u64(data: &[u8], position: usize) -> BlittableResult<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;
    for i in 0..MAX_VARINT_LEN {
        let byte = *data.get(position + i).ok_or_else(|| {
            BlittableError::invalid_format(format!(
                "variable-length integer at {position} runs past the end of the document"
            ))
        })?;
        let group = u64::from(byte & 0x7F);
        if i == MAX_VARINT_LEN - 1 && group > 1 {
            return Err(BlittableError::MalformedVarint { position });
        }
        result |= group << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    Err(BlittableError::MalformedVarint { position })
}

/// Decodes a signed value stored as its two's-complement `u64`.
///
/// # Errors
///
/// Same as [`decode_u64`].
#[allow(clippy::cast_possible_wrap)]
pub fn decode_i64(data: &[u8], position: usize) -> BlittableResult<(i64, usize)> {
    decode_u64(data, position).map(|(value, len)| (value as i64, len))
}

/// Decodes a length or count and checks that it fits in `usize`.
///
/// # Errors
///
/// Same as [`decode_u64`], plus [`BlittableError::InvalidFormat`] when the
/// value does not fit in `usize`.
pub fn decode_usize(data: &[u8], position: usize) -> BlittableResult<(usize, usize)> {
    let (value, len) = decode_u64(data, position)?;
    let value = usize::try_from(value).map_err(|_| {
        BlittableError::invalid_format(format!("length {value} at {position} is too large"))
    })?;
    Ok((value, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut out = [0u8; MAX_VARINT_LEN];
        let len = encode_u64(value, &mut out);
        out[..len].to_vec()
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(127), vec![0x7F]);
        assert_eq!(encode(128), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xAC, 0x02]);
        assert_eq!(encode(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn negative_values_take_ten_bytes() {
        let mut out = [0u8; MAX_VARINT_LEN];
        assert_eq!(encode_i64(-1, &mut out), MAX_VARINT_LEN);
        assert_eq!(decode_i64(&out, 0).unwrap(), (-1, MAX_VARINT_LEN));
    }

    #[test]
    fn decode_at_offset() {
        let data = [0xFF, 0xAC, 0x02, 0x00];
        assert_eq!(decode_u64(&data, 1).unwrap(), (300, 2));
    }

    #[test]
    fn eleven_continuation_bytes_are_malformed() {
        let data = [0xFFu8; 11];
        assert_eq!(
            decode_u64(&data, 0),
            Err(BlittableError::MalformedVarint { position: 0 })
        );
    }

    #[test]
    fn overflowing_tenth_byte_is_malformed() {
        let mut data = [0x80u8; 10];
        data[9] = 0x02;
        assert_eq!(
            decode_u64(&data, 0),
            Err(BlittableError::MalformedVarint { position: 0 })
        );
    }

    #[test]
    fn truncated_varint_is_invalid_format() {
        let err = decode_u64(&[0x80, 0x80], 0).unwrap_err();
        assert!(matches!(err, BlittableError::InvalidFormat { .. }));
    }

    proptest! {
        #[test]
        fn signed_values_survive(value in any::<i64>()) {
            let mut out = [0u8; MAX_VARINT_LEN];
            let len = encode_i64(value, &mut out);
            prop_assert_eq!(decode_i64(&out[..len], 0).unwrap(), (value, len));
        }
    }
}
