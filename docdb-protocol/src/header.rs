//! Fixed-size binary message header.
//!
//! Every wire message starts with a 16-byte header of four little-endian
//! u32 fields:
//!
//! ```text
//! +----------------+------------+-------------+---------+
//! | message_length | request_id | response_to | op_code |
//! |    4 bytes     |  4 bytes   |   4 bytes   | 4 bytes |
//! +----------------+------------+-------------+---------+
//! ```
//!
//! `message_length` counts the whole message, header included.
//! `response_to` carries the `request_id` of the request a reply answers;
//! it is zero on a fresh request.

use crate::error::ProtocolError;
use bytes::BufMut;

/// Size of the message header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Wire operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpCode {
    /// Legacy server reply.
    Reply = 1,
    Update = 2001,
    Insert = 2002,
    Reserved = 2003,
    Query = 2004,
    GetMore = 2005,
    Delete = 2006,
    KillCursors = 2007,
    /// Unified message op code used for commands and their replies.
    Msg = 2013,
}

impl OpCode {
    /// Maps a raw wire value to an op code.
    pub fn from_u32(value: u32) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(OpCode::Reply),
            2001 => Ok(OpCode::Update),
            2002 => Ok(OpCode::Insert),
            2003 => Ok(OpCode::Reserved),
            2004 => Ok(OpCode::Query),
            2005 => Ok(OpCode::GetMore),
            2006 => Ok(OpCode::Delete),
            2007 => Ok(OpCode::KillCursors),
            2013 => Ok(OpCode::Msg),
            other => Err(ProtocolError::UnknownOpCode(other)),
        }
    }
}

/// A decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total message length in bytes, header included.
    pub message_length: u32,
    /// Identifier of this message.
    pub request_id: u32,
    /// `request_id` of the request this message answers (zero for requests).
    pub response_to: u32,
    /// Operation code.
    pub op_code: OpCode,
}

impl MessageHeader {
    /// Creates a request header (`response_to` is zero).
    pub fn request(message_length: u32, request_id: u32, op_code: OpCode) -> Self {
        Self {
            message_length,
            request_id,
            response_to: 0,
            op_code,
        }
    }

    /// Encodes the header into its 16-byte wire form.
    ///
    /// Field values are written as supplied; no range validation is done.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.message_length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.request_id.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.response_to.to_le_bytes());
        bytes[12..16].copy_from_slice(&(self.op_code as u32).to_le_bytes());
        bytes
    }

    /// Appends the encoded header to a buffer.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.encode());
    }

    /// Decodes a header from the first 16 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtocolError::MalformedHeader { len: buf.len() });
        }

        let read_u32 =
            |offset: usize| u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());

        Ok(Self {
            message_length: read_u32(0),
            request_id: read_u32(4),
            response_to: read_u32(8),
            op_code: OpCode::from_u32(read_u32(12))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_header_roundtrip() {
        let header = MessageHeader {
            message_length: 1234,
            request_id: 42,
            response_to: 7,
            op_code: OpCode::Msg,
        };

        let encoded = header.encode();
        let decoded = MessageHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_little_endian_layout() {
        let header = MessageHeader {
            message_length: 0x0100,
            request_id: 1,
            response_to: 0,
            op_code: OpCode::Reply,
        };

        let encoded = header.encode();
        // 0x0100 little-endian: low byte first
        assert_eq!(&encoded[0..4], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&encoded[4..8], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&encoded[8..12], &[0x00, 0x00, 0x00, 0x00]);
        assert_eq!(&encoded[12..16], &[0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_decode_short_buffer() {
        for len in 0..HEADER_SIZE {
            let buf = vec![0u8; len];
            let result = MessageHeader::decode(&buf);
            assert!(
                matches!(result, Err(ProtocolError::MalformedHeader { len: l }) if l == len),
                "expected MalformedHeader for {} bytes",
                len
            );
        }
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let header = MessageHeader::request(16, 9, OpCode::GetMore);
        let mut buf = header.encode().to_vec();
        buf.extend_from_slice(b"trailing payload");

        let decoded = MessageHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_op_code_values() {
        assert_eq!(OpCode::Reply as u32, 1);
        assert_eq!(OpCode::Update as u32, 2001);
        assert_eq!(OpCode::Insert as u32, 2002);
        assert_eq!(OpCode::Reserved as u32, 2003);
        assert_eq!(OpCode::Query as u32, 2004);
        assert_eq!(OpCode::GetMore as u32, 2005);
        assert_eq!(OpCode::Delete as u32, 2006);
        assert_eq!(OpCode::KillCursors as u32, 2007);
        assert_eq!(OpCode::Msg as u32, 2013);
    }

    #[test]
    fn test_unknown_op_code() {
        let mut buf = MessageHeader::request(16, 1, OpCode::Msg).encode();
        buf[12..16].copy_from_slice(&2999u32.to_le_bytes());

        let result = MessageHeader::decode(&buf);
        assert!(matches!(result, Err(ProtocolError::UnknownOpCode(2999))));
    }

    proptest! {
        #[test]
        fn prop_header_roundtrip(
            message_length in any::<u32>(),
            request_id in any::<u32>(),
            response_to in any::<u32>(),
            op in prop::sample::select(vec![
                OpCode::Reply,
                OpCode::Update,
                OpCode::Insert,
                OpCode::Reserved,
                OpCode::Query,
                OpCode::GetMore,
                OpCode::Delete,
                OpCode::KillCursors,
                OpCode::Msg,
            ]),
        ) {
            let header = MessageHeader {
                message_length,
                request_id,
                response_to,
                op_code: op,
            };
            let decoded = MessageHeader::decode(&header.encode()).unwrap();
            prop_assert_eq!(decoded, header);
        }
    }
}
