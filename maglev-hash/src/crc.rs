//! Non-inverted CRC-32C folding.
//!
//! These helpers reproduce the SSE4.2 `crc32` instruction: the running value is
//! used exactly as passed in, with no initial or final inversion. The standard
//! CRC-32C checksum inverts on both ends, so the fold is the standard append
//! with both inversions undone.

/// Fold raw bytes into a running CRC.
#[inline]
pub fn crc32c_update(crc: u32, bytes: &[u8]) -> u32 {
    !crc32c::crc32c_append(!crc, bytes)
}

/// Fold a 32-bit word, least significant byte first.
#[inline]
pub fn crc32c_u32(crc: u32, word: u32) -> u32 {
    crc32c_update(crc, &word.to_le_bytes())
}

/// Fold a 64-bit word, least significant byte first.
#[inline]
pub fn crc32c_u64(crc: u32, value: u64) -> u32 {
    crc32c_update(crc, &value.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_hardware_instruction() {
        assert_eq!(crc32c_u32(0, 6), 0xc445_1272);
    }

    #[test]
    fn inverted_form_is_standard_crc32c() {
        assert_eq!(!crc32c_update(!0, &[6, 6, 6, 6]), 0x12fd_1978);
        assert_eq!(!crc32c_update(!0, b"123456789"), 0xe306_9283);
        assert_eq!(!crc32c_update(!0, b"123456789"), crc32c::crc32c(b"123456789"));
    }

    #[test]
    fn running_value_is_not_inverted() {
        assert_eq!(crc32c_update(0xdead_beef, &6u32.to_le_bytes()), 0xcddc_0f66);
        assert_eq!(crc32c_update(0x1234_5678, &6u32.to_le_bytes()), 0x3e31_4446);
    }

    #[test]
    fn word_folds_agree_with_byte_folds() {
        assert_eq!(crc32c_u64(0, 6), crc32c_update(0, &[6, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(crc32c_u64(0, 6), 0xb365_7823);
        assert_eq!(
            crc32c_u32(0xdead_beef, 0x0102_0304),
            crc32c_update(0xdead_beef, &[4, 3, 2, 1])
        );
    }

    #[test]
    fn zero_state_absorbs_zero_bytes() {
        assert_eq!(crc32c_update(0, &[0; 16]), 0);
    }
}
