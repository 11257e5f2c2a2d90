//! Sub-block checksum.
//!
//! An 8-bit LFSR-style rolling checksum computed over exactly the 256-byte
//! payload of a sub-block. Device documentation calls this a "CRC" but it
//! is this custom bit-serial routine; the sub-block number itself is never
//! part of the checksum.

use crate::error::{CodecError, Result};
use crate::types::SUB_BLOCK_LEN as PAYLOAD_LEN;

const ROUND_MASK: u8 = 0x19;
const FINAL_XOR: u8 = 0xBF;

/// Compute the sub-block checksum over a 256-byte payload.
///
/// # Errors
///
/// Returns [`CodecError::BadLength`] if `payload.len() != 256`.
pub fn checksum(payload: &[u8]) -> Result<u8> {
    if payload.len() != PAYLOAD_LEN {
        return Err(CodecError::BadLength {
            expected: PAYLOAD_LEN,
            actual: payload.len(),
        });
    }

    let mut c: u8 = 0;
    for &byte in payload {
        let mut b = byte;
        for _ in 0..8 {
            if (b ^ c) & 1 == 0 {
                c ^= ROUND_MASK;
            }
            b >>= 1;
            c = (c & 1) << 7 | (c >> 1);
        }
    }
    Ok(c ^ FINAL_XOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(text: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; PAYLOAD_LEN];
        buf[..text.len()].copy_from_slice(text);
        buf
    }

    // Scenario C.
    #[test]
    fn test_scenario_c_updating_firmware() {
        let payload = padded(b"UPDATING FIRMWARE");
        assert_eq!(checksum(&payload).unwrap(), 0x47);
    }

    // Scenario D.
    #[test]
    fn test_scenario_d_ready_please_cycle_power() {
        let payload = padded(b"READY... PLEASE CYCLE POWER");
        assert_eq!(checksum(&payload).unwrap(), 0x48);
    }

    #[test]
    fn test_determinism() {
        let payload = padded(b"determinism check");
        assert_eq!(checksum(&payload).unwrap(), checksum(&payload).unwrap());
    }

    #[test]
    fn test_single_bit_change_changes_checksum() {
        let mut payload = padded(b"bit flip sensitivity");
        let base = checksum(&payload).unwrap();
        payload[0] ^= 0x01;
        let flipped = checksum(&payload).unwrap();
        assert_ne!(base, flipped);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = checksum(&[0u8; 255]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::BadLength {
                expected: 256,
                actual: 255
            }
        ));
    }

    #[test]
    fn test_all_zero_payload() {
        // Regression anchor: an all-zero payload should still checksum
        // deterministically and not panic on the bit-serial loop.
        let payload = vec![0u8; PAYLOAD_LEN];
        let c = checksum(&payload).unwrap();
        assert_eq!(c, checksum(&payload).unwrap());
    }
}
