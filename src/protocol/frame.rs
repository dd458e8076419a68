//! Frame header and variable block codec.
//!
//! Wire layout (multi-byte integers are Little Endian):
//!
//! ```text
//! ┌───────────┬──────────┬───────────┐
//! │ modifier1 │ size     │ modifier2 │
//! │ 1 byte    │ u16 LE   │ 1 byte    │
//! └───────────┴──────────┴───────────┘
//! followed by `size` bytes of:
//!   keyLen (u16 LE) | key | valLen (u16 LE) | val | ...
//! ```
//!
//! The `size` field always equals the exact encoded length of the variable
//! block. `encode_vars` returns the block so the caller writes its real
//! length into the header rather than guessing it.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{FramingError, ProtocolError};

/// Fixed frame header length in bytes.
pub const HEADER_LEN: usize = 4;

/// Decoded uwsgi frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol extension selector; 0 for a plain uwsgi request. Ignored here.
    pub modifier1: u8,
    /// Byte length of the variable block that follows the header.
    pub size: u16,
    /// Second extension byte. Ignored here.
    pub modifier2: u8,
}

impl FrameHeader {
    /// Decode the first four bytes of a connection.
    pub fn decode(buf: &[u8]) -> Result<Self, FramingError> {
        if buf.len() < HEADER_LEN {
            return Err(FramingError::TruncatedHeader(buf.len()));
        }
        Ok(Self {
            modifier1: buf[0],
            size: u16::from_le_bytes([buf[1], buf[2]]),
            modifier2: buf[3],
        })
    }

    /// Encode to the 4-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.modifier1;
        out[1..3].copy_from_slice(&self.size.to_le_bytes());
        out[3] = self.modifier2;
        out
    }
}

/// Decode a complete variable block into its ordered (key, value) pairs.
///
/// Pairs are packed back-to-back and read until exactly `block.len()` bytes
/// are consumed. A length prefix pointing past the end of the block is a
/// [`FramingError::LengthOverrun`].
pub fn decode_vars(block: &[u8]) -> Result<Vec<(Bytes, Bytes)>, FramingError> {
    let size = block.len();
    let mut buf = block;
    let mut entries = Vec::new();
    while buf.has_remaining() {
        let key = take_segment(&mut buf, size)?;
        let value = take_segment(&mut buf, size)?;
        entries.push((key, value));
    }
    Ok(entries)
}

fn take_segment(buf: &mut &[u8], size: usize) -> Result<Bytes, FramingError> {
    if buf.remaining() < 2 {
        return Err(FramingError::LengthOverrun {
            offset: size - buf.remaining(),
            size,
        });
    }
    let len = buf.get_u16_le() as usize;
    if buf.remaining() < len {
        return Err(FramingError::LengthOverrun {
            offset: size - buf.remaining(),
            size,
        });
    }
    Ok(buf.copy_to_bytes(len))
}

/// Encode ordered (key, value) pairs into a variable block.
///
/// The returned block's length is the value the caller writes into the
/// header's `size` field; it is checked to fit 16 bits, as is every
/// individual key and value.
pub fn encode_vars<K, V>(entries: &[(K, V)]) -> Result<Bytes, ProtocolError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut buf = BytesMut::new();
    for (key, value) in entries {
        put_segment(&mut buf, key.as_ref(), key.as_ref())?;
        put_segment(&mut buf, value.as_ref(), key.as_ref())?;
    }
    if buf.len() > u16::MAX as usize {
        return Err(ProtocolError::BlockTooLarge(buf.len()));
    }
    Ok(buf.freeze())
}

fn put_segment(buf: &mut BytesMut, segment: &str, key: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(segment.len())
        .map_err(|_| ProtocolError::OversizedEntry(key.to_string()))?;
    buf.put_u16_le(len);
    buf.put_slice(segment.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = FrameHeader {
            modifier1: 0,
            size: 0x1234,
            modifier2: 9,
        };
        let bytes = header.encode();
        assert_eq!(bytes, [0, 0x34, 0x12, 9]);
        assert_eq!(FrameHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn header_rejects_short_input() {
        assert!(matches!(
            FrameHeader::decode(&[0, 1]),
            Err(FramingError::TruncatedHeader(2))
        ));
    }

    #[test]
    fn vars_round_trip() {
        let entries = vec![
            ("REQUEST_METHOD".to_string(), "POST".to_string()),
            ("REQUEST_URI".to_string(), "/foo".to_string()),
            ("QUERY_STRING".to_string(), String::new()),
            ("HTTP_USER_AGENT".to_string(), "test".to_string()),
        ];
        let block = encode_vars(&entries).unwrap();
        let decoded: Vec<(String, String)> = decode_vars(&block)
            .unwrap()
            .into_iter()
            .map(|(k, v)| {
                (
                    String::from_utf8(k.to_vec()).unwrap(),
                    String::from_utf8(v.to_vec()).unwrap(),
                )
            })
            .collect();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn empty_block_decodes_to_no_entries() {
        assert!(decode_vars(&[]).unwrap().is_empty());
    }

    #[test]
    fn length_prefix_overrunning_block_is_rejected() {
        // keyLen = 10 but only 3 bytes follow.
        let block = [10, 0, b'a', b'b', b'c'];
        assert!(matches!(
            decode_vars(&block),
            Err(FramingError::LengthOverrun { offset: 2, size: 5 })
        ));
    }

    #[test]
    fn dangling_length_prefix_is_rejected() {
        // A single trailing byte cannot hold a 2-byte length prefix.
        let entries = vec![("KEY".to_string(), "value".to_string())];
        let mut block = encode_vars(&entries).unwrap().to_vec();
        block.push(0);
        assert!(matches!(
            decode_vars(&block),
            Err(FramingError::LengthOverrun { .. })
        ));
    }

    #[test]
    fn oversized_value_is_rejected_on_encode() {
        let entries = vec![("KEY".to_string(), "v".repeat(70_000))];
        assert!(matches!(
            encode_vars(&entries),
            Err(ProtocolError::OversizedEntry(_))
        ));
    }
}
