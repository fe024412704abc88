//! # docdb-protocol
//!
//! Wire protocol implementation for docdb.
//!
//! This crate provides:
//! - The fixed 16-byte little-endian message header codec
//! - Binary framing of JSON command documents with an incremental decoder
//! - Byte-level validators (structural UTF-8, UUID hex canonicalization)
//! - Protocol error types

pub mod codec;
pub mod error;
pub mod header;
pub mod utf8;
pub mod uuid;

pub use codec::{encode_message, Decoder, WireMessage};
pub use error::ProtocolError;
pub use header::{MessageHeader, OpCode, HEADER_SIZE};
pub use utf8::validate_utf8;

/// Default port for a docdb server.
pub const DEFAULT_PORT: u16 = 27017;

/// Maximum total message size (48 MiB), header included.
pub const MAX_MESSAGE_SIZE: u32 = 48 * 1024 * 1024;
