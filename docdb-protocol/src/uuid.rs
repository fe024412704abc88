//! UUID hex canonicalization.
//!
//! Accepts and produces the two canonical textual forms of a v4-shaped
//! UUID: 32 hex digits, or 36 characters with dashes after hex positions
//! 8/13/18/23. Validation checks shape only (hex digits, version nibble
//! `4`, variant nibble in `8..b`), case-insensitively.

use crate::error::ProtocolError;

/// Lowercase hex digit table used when encoding bytes.
const HEX_TABLE: &[u8; 16] = b"0123456789abcdef";

/// Dash offsets in the 36-character dashed form.
const DASH_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Returns true iff `s` is a v4-shaped UUID in dashed or dash-free form.
pub fn validate_string(s: &str) -> bool {
    normalize(s).is_some()
}

/// Strips dashes and lowercases, returning the 32 hex digits, or `None`
/// if the string is not a v4-shaped UUID.
fn normalize(s: &str) -> Option<[u8; 32]> {
    let bytes = s.as_bytes();
    let mut hex = [0u8; 32];
    let mut filled = 0;

    match bytes.len() {
        32 => {
            for (i, &b) in bytes.iter().enumerate() {
                hex[i] = b.to_ascii_lowercase();
            }
            filled = 32;
        }
        36 => {
            for (i, &b) in bytes.iter().enumerate() {
                if DASH_POSITIONS.contains(&i) {
                    if b != b'-' {
                        return None;
                    }
                } else {
                    hex[filled] = b.to_ascii_lowercase();
                    filled += 1;
                }
            }
        }
        _ => return None,
    }

    debug_assert_eq!(filled, 32);

    if !hex.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    // Version nibble, then variant nibble
    if hex[12] != b'4' {
        return None;
    }
    if !matches!(hex[16], b'8' | b'9' | b'a' | b'b') {
        return None;
    }

    Some(hex)
}

/// Decodes a UUID string into its 16 raw bytes.
pub fn hex_string_to_bytes(s: &str) -> Result<[u8; 16], ProtocolError> {
    let hex = normalize(s).ok_or_else(|| {
        ProtocolError::InvalidUuidFormat(format!(
            "expected a 32-hex-digit v4 UUID (with or without dashes), got {:?}",
            s
        ))
    })?;

    let nibble = |b: u8| match b {
        b'0'..=b'9' => b - b'0',
        _ => b - b'a' + 10,
    };

    let mut bytes = [0u8; 16];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = (nibble(hex[2 * i]) << 4) | nibble(hex[2 * i + 1]);
    }
    Ok(bytes)
}

/// Encodes 16 raw bytes as a lowercase hex UUID string.
///
/// With `include_dashes`, dashes are inserted at the canonical byte-group
/// boundaries 4/6/8/10.
pub fn bytes_to_hex_string(bytes: &[u8; 16], include_dashes: bool) -> String {
    let capacity = if include_dashes { 36 } else { 32 };
    let mut out = String::with_capacity(capacity);

    for (i, &byte) in bytes.iter().enumerate() {
        if include_dashes && matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push(HEX_TABLE[(byte >> 4) as usize] as char);
        out.push(HEX_TABLE[(byte & 0x0F) as usize] as char);
    }
    out
}
