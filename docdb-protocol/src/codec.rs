//! Encoding and incremental decoding of wire messages.
//!
//! A wire message is the 16-byte header followed by a JSON document
//! payload; `message_length` in the header covers both.

use crate::error::ProtocolError;
use crate::header::{MessageHeader, OpCode, HEADER_SIZE};
use crate::utf8::validate_utf8;
use crate::MAX_MESSAGE_SIZE;
use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;

/// A complete decoded wire message.
#[derive(Debug, Clone)]
pub struct WireMessage {
    pub header: MessageHeader,
    pub body: Value,
}

/// Encodes a message into its wire form.
pub fn encode_message(
    request_id: u32,
    response_to: u32,
    op_code: OpCode,
    body: &Value,
) -> Result<BytesMut, ProtocolError> {
    let payload = serde_json::to_vec(body)?;
    let total = HEADER_SIZE + payload.len();
    if total > MAX_MESSAGE_SIZE as usize {
        return Err(ProtocolError::MessageTooLarge {
            size: total as u32,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let header = MessageHeader {
        message_length: total as u32,
        request_id,
        response_to,
        op_code,
    };

    let mut buf = BytesMut::with_capacity(total);
    header.write_to(&mut buf);
    buf.put_slice(&payload);
    Ok(buf)
}

/// Incremental decoder over a byte stream.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete message from the buffer.
    ///
    /// Returns `Ok(Some(message))` if one was decoded, `Ok(None)` if more
    /// data is needed, or `Err` on protocol errors.
    pub fn decode_message(&mut self) -> Result<Option<WireMessage>, ProtocolError> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        // Peek at the header without consuming
        let header = MessageHeader::decode(&self.buffer)?;
        let total = header.message_length as usize;

        if total < HEADER_SIZE {
            return Err(ProtocolError::MalformedHeader { len: total });
        }
        if total > MAX_MESSAGE_SIZE as usize {
            return Err(ProtocolError::MessageTooLarge {
                size: header.message_length,
                max: MAX_MESSAGE_SIZE,
            });
        }
        if self.buffer.len() < total {
            return Ok(None);
        }

        self.buffer.advance(HEADER_SIZE);
        let payload = self.buffer.split_to(total - HEADER_SIZE);

        if !validate_utf8(&payload, 0, payload.len()) {
            return Err(ProtocolError::InvalidUtf8);
        }
        let body: Value = serde_json::from_slice(&payload)?;

        Ok(Some(WireMessage { header, body }))
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_roundtrip() {
        let body = json!({"ping": 1, "$db": "admin"});
        let encoded = encode_message(7, 0, OpCode::Msg, &body).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);

        let message = decoder.decode_message().unwrap().unwrap();
        assert_eq!(message.header.request_id, 7);
        assert_eq!(message.header.response_to, 0);
        assert_eq!(message.header.op_code, OpCode::Msg);
        assert_eq!(message.header.message_length as usize, encoded.len());
        assert_eq!(message.body, body);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_partial_message() {
        let encoded = encode_message(1, 0, OpCode::Msg, &json!({"ok": 1})).unwrap();

        let mut decoder = Decoder::new();

        // Partial header
        decoder.extend(&encoded[..10]);
        assert!(decoder.decode_message().unwrap().is_none());

        // Full header, partial payload
        decoder.extend(&encoded[10..encoded.len() - 3]);
        assert!(decoder.decode_message().unwrap().is_none());

        // Rest
        decoder.extend(&encoded[encoded.len() - 3..]);
        let message = decoder.decode_message().unwrap().unwrap();
        assert_eq!(message.body, json!({"ok": 1}));
    }

    #[test]
    fn test_multiple_messages_in_order() {
        let mut decoder = Decoder::new();
        decoder.extend(&encode_message(1, 0, OpCode::Msg, &json!({"n": 1})).unwrap());
        decoder.extend(&encode_message(2, 1, OpCode::Msg, &json!({"n": 2})).unwrap());

        let first = decoder.decode_message().unwrap().unwrap();
        assert_eq!(first.header.request_id, 1);
        assert_eq!(first.body["n"], 1);

        let second = decoder.decode_message().unwrap().unwrap();
        assert_eq!(second.header.response_to, 1);
        assert_eq!(second.body["n"], 2);

        assert!(decoder.decode_message().unwrap().is_none());
    }

    #[test]
    fn test_declared_length_too_large() {
        let mut header = MessageHeader::request(0, 1, OpCode::Msg);
        header.message_length = MAX_MESSAGE_SIZE + 1;

        let mut decoder = Decoder::new();
        decoder.extend(&header.encode());
        let result = decoder.decode_message();
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_declared_length_below_header_size() {
        let mut header = MessageHeader::request(0, 1, OpCode::Msg);
        header.message_length = 4;

        let mut decoder = Decoder::new();
        decoder.extend(&header.encode());
        let result = decoder.decode_message();
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedHeader { len: 4 })
        ));
    }

    #[test]
    fn test_invalid_utf8_payload() {
        let payload = [0xFF, 0xFE, 0xFD];
        let header = MessageHeader::request((HEADER_SIZE + payload.len()) as u32, 1, OpCode::Msg);

        let mut decoder = Decoder::new();
        decoder.extend(&header.encode());
        decoder.extend(&payload);

        let result = decoder.decode_message();
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8)));
    }

    #[test]
    fn test_decoder_buffered_and_clear() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.buffered(), 0);

        decoder.extend(b"some bytes");
        assert_eq!(decoder.buffered(), 10);

        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }
}
