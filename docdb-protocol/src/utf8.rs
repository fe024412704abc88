//! Structural UTF-8 validation.

/// Validates that `bytes[start..end)` is a structurally well-formed UTF-8
/// sequence.
///
/// Single forward pass tracking outstanding continuation bytes: each lead
/// byte fixes how many `10xxxxxx` continuation bytes must follow, and the
/// range must not end mid-sequence.
///
/// This is a structural check only. Overlong encodings, surrogate-range
/// code points, and values above U+10FFFF are NOT rejected.
///
/// A window that is inverted or extends past `bytes` is invalid.
pub fn validate_utf8(bytes: &[u8], start: usize, end: usize) -> bool {
    if start > end || end > bytes.len() {
        return false;
    }

    let mut continuation = 0u8;

    for &byte in &bytes[start..end] {
        if continuation > 0 {
            if byte & 0b1100_0000 != 0b1000_0000 {
                return false;
            }
            continuation -= 1;
        } else if byte & 0b1000_0000 == 0 {
            // ASCII
        } else if byte & 0b1110_0000 == 0b1100_0000 {
            continuation = 1;
        } else if byte & 0b1111_0000 == 0b1110_0000 {
            continuation = 2;
        } else if byte & 0b1111_1000 == 0b1111_0000 {
            continuation = 3;
        } else {
            // Stray continuation byte or 11111xxx lead
            return false;
        }
    }

    continuation == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_valid() {
        let bytes = b"plain ascii text, nothing fancy";
        assert!(validate_utf8(bytes, 0, bytes.len()));
    }

    #[test]
    fn test_empty_range_valid() {
        assert!(validate_utf8(b"abc", 1, 1));
    }

    #[test]
    fn test_multibyte_valid() {
        // 2-, 3-, and 4-byte sequences
        let s = "é € 😀";
        assert!(validate_utf8(s.as_bytes(), 0, s.len()));
    }

    #[test]
    fn test_truncated_sequence_at_boundary() {
        let bytes = "a€".as_bytes(); // 0x61 0xE2 0x82 0xAC
        assert!(validate_utf8(bytes, 0, bytes.len()));
        // Cut the 3-byte sequence short
        assert!(!validate_utf8(bytes, 0, bytes.len() - 1));
        assert!(!validate_utf8(bytes, 0, 2));
    }

    #[test]
    fn test_stray_continuation_byte() {
        assert!(!validate_utf8(&[0x80], 0, 1));
        assert!(!validate_utf8(&[b'a', 0xBF, b'b'], 0, 3));
    }

    #[test]
    fn test_invalid_lead_byte() {
        // 11111xxx is never a valid lead
        assert!(!validate_utf8(&[0xF8], 0, 1));
        assert!(!validate_utf8(&[0xFF, 0x80], 0, 2));
    }

    #[test]
    fn test_missing_continuation() {
        // 2-byte lead followed by ASCII
        assert!(!validate_utf8(&[0xC3, b'x'], 0, 2));
    }

    #[test]
    fn test_out_of_range_window_invalid() {
        // Inverted or overlong windows must not panic
        assert!(!validate_utf8(b"ok", 3, 1));
        assert!(!validate_utf8(b"ok", 0, 99));
        assert!(!validate_utf8(b"ok", 5, 5));
        assert!(!validate_utf8(b"", 1, 1));
    }

    #[test]
    fn test_subrange_skips_outside_bytes() {
        // Invalid byte before the range is ignored
        let bytes = [0xFF, b'o', b'k'];
        assert!(validate_utf8(&bytes, 1, 3));
    }

    #[test]
    fn test_permissive_overlong_and_surrogates() {
        // Structurally valid but semantically illegal sequences pass:
        // overlong NUL
        assert!(validate_utf8(&[0xC0, 0x80], 0, 2));
        // UTF-8-shaped surrogate U+D800
        assert!(validate_utf8(&[0xED, 0xA0, 0x80], 0, 3));
    }
}
