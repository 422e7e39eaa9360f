//! Varint encoding and decoding for the Avro binary format.
//!
//! Avro uses the same varint encoding as Protocol Buffers:
//! - Each byte has 7 bits of data and 1 continuation bit (MSB)
//! - Bytes are in little-endian order
//!
//! Signed integers are zigzag encoded first:
//! - 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...

use bytes::BufMut;

use crate::error::DecodeError;

/// Decode an unsigned variable-length integer, advancing the cursor.
///
/// # Errors
/// - `DecodeError::UnexpectedEof` if the input is truncated
/// - `DecodeError::InvalidVarint` if the varint exceeds 10 bytes
#[inline]
pub fn decode_varint(data: &mut &[u8]) -> Result<u64, DecodeError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let (&byte, rest) = data.split_first().ok_or(DecodeError::UnexpectedEof)?;
        *data = rest;

        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
        if shift >= 64 {
            return Err(DecodeError::InvalidVarint);
        }
    }
}

/// Decode a zigzag-encoded signed 64-bit integer.
#[inline]
pub fn decode_long(data: &mut &[u8]) -> Result<i64, DecodeError> {
    let n = decode_varint(data)?;
    Ok(((n >> 1) as i64) ^ -((n & 1) as i64))
}

/// Decode a zigzag-encoded signed 32-bit integer.
#[inline]
pub fn decode_int(data: &mut &[u8]) -> Result<i32, DecodeError> {
    let value = decode_long(data)?;
    i32::try_from(value)
        .map_err(|_| DecodeError::InvalidData(format!("Int value {} out of range", value)))
}

/// Zigzag-encode a signed integer.
#[inline]
pub fn encode_zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Append an unsigned varint.
#[inline]
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Append a zigzag-encoded signed integer.
#[inline]
pub fn encode_long(value: i64, buf: &mut impl BufMut) {
    encode_varint(encode_zigzag(value), buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_zigzag_mapping() {
        assert_eq!(encode_zigzag(0), 0);
        assert_eq!(encode_zigzag(-1), 1);
        assert_eq!(encode_zigzag(1), 2);
        assert_eq!(encode_zigzag(-2), 3);
        assert_eq!(encode_zigzag(i64::MIN), u64::MAX);
    }

    #[test]
    fn test_long_extremes() {
        for value in [0, 1, -1, 63, -64, 64, i32::MAX as i64, i64::MAX, i64::MIN] {
            let mut buf = BytesMut::new();
            encode_long(value, &mut buf);
            let mut cursor: &[u8] = &buf;
            assert_eq!(decode_long(&mut cursor).unwrap(), value);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn test_truncated_varint() {
        let mut cursor: &[u8] = &[0x80, 0x80];
        assert!(matches!(
            decode_varint(&mut cursor),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_overlong_varint() {
        let bytes = [0xFFu8; 11];
        let mut cursor: &[u8] = &bytes;
        assert!(matches!(
            decode_varint(&mut cursor),
            Err(DecodeError::InvalidVarint)
        ));
    }

    #[test]
    fn test_int_out_of_range() {
        let mut buf = BytesMut::new();
        encode_long(i64::from(i32::MAX) + 1, &mut buf);
        let mut cursor: &[u8] = &buf;
        assert!(decode_int(&mut cursor).is_err());
    }
}
