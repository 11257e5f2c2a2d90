//! 7/8 bit-packer.
//!
//! MIDI SysEx payload bytes must have their high bit clear. This module
//! packs arbitrary 8-bit data into a 7-bit-clean stream by stealing the top
//! bit of seven consecutive bytes into an eighth "high-bits" byte, and
//! reverses the process on decode.

use crate::error::{CodecError, Result};

/// Pack an arbitrary byte sequence into a 7-bit-clean stream.
///
/// Every run of up to seven input bytes becomes eight output bytes: the
/// seven input bytes with their high bit stripped, followed by one byte
/// whose low seven bits carry those stripped high bits (most significant
/// input byte's high bit goes in bit 6, down to bit 0 for the seventh).
/// Short final groups are zero-padded; the caller is responsible for
/// trimming that padding back out after `unpack`.
pub fn pack(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity((data.len() + 6) / 7 * 8);
    for group in data.chunks(7) {
        let mut padded = [0u8; 7];
        padded[..group.len()].copy_from_slice(group);

        let mut high = 0u8;
        for (i, &b) in padded.iter().enumerate() {
            out.push(b & 0x7F);
            high |= ((b >> 7) & 1) << (6 - i);
        }
        out.push(high);
    }
    out
}

/// Unpack a 7-bit-clean stream produced by [`pack`] back into 8-bit bytes.
///
/// # Errors
///
/// Returns [`CodecError::BadLength`] if `data.len()` is not a multiple of 8.
pub fn unpack(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % 8 != 0 {
        return Err(CodecError::BadLength {
            expected: 8,
            actual: data.len(),
        });
    }

    let mut out = Vec::with_capacity(data.len() / 8 * 7);
    for group in data.chunks(8) {
        let high = group[7];
        for (i, &p) in group[..7].iter().enumerate() {
            let bit = (high << (i as u8 + 1)) & 0x80;
            out.push(p | bit);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_full_groups() {
        let data: Vec<u8> = (0u8..=139).collect(); // 140 = 20*7
        let packed = pack(&data);
        assert_eq!(packed.len(), 8 * (data.len() / 7));
        let unpacked = unpack(&packed).unwrap();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn test_unpack_output_width() {
        let data = vec![0u8; 16 * 8];
        let unpacked = unpack(&data).unwrap();
        assert_eq!(unpacked.len(), 16 * 7);
    }

    #[test]
    fn test_bad_length() {
        // 21 is not a multiple of 8; `actual` must report the full input
        // length (21), not `21 % 8` (5), so the error message states the
        // real complaint instead of a misleadingly small number.
        let err = unpack(&[0u8; 21]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::BadLength {
                expected: 8,
                actual: 21
            }
        ));
    }

    // Scenario A: an input with every byte's high bit exercised. The
    // low-7-bits bytes are the masked originals; the header byte collects
    // the stripped high bits per the §4.1 shift formula (MSB of b0 lands in
    // bit 6 of the header, down to b6 in bit 0).
    #[test]
    fn test_scenario_a_all_bit_input() {
        let packed = pack(&[0xFF, 0x55, 0xAA]);
        assert_eq!(packed[0], 0x7F); // 0xFF & 0x7F
        assert_eq!(packed[1], 0x55); // 0x55 & 0x7F (already 7-bit clean)
        assert_eq!(packed[2], 0x2A); // 0xAA & 0x7F
        assert_eq!(&packed[3..7], &[0, 0, 0, 0]); // zero padding
        assert_eq!(packed[7], 0x50); // bit6 (from 0xFF) | bit4 (from 0xAA)
    }

    // Scenario B: an input that is already 7-bit clean contributes no high
    // bits at all, so the header byte is zero.
    #[test]
    fn test_scenario_b_seven_bit_input() {
        let packed = pack(&[0x7F, 0x55, 0x2A]);
        assert_eq!(&packed[..3], &[0x7F, 0x55, 0x2A]);
        assert_eq!(packed[7], 0x00);
    }

    #[test]
    fn test_pack_accepts_any_length() {
        for len in 0..20 {
            let data: Vec<u8> = (0..len as u8).collect();
            let packed = pack(&data);
            assert_eq!(packed.len() % 8, 0);
        }
    }

    #[test]
    fn test_short_group_padding_trims_to_zero() {
        // A single byte still produces a full 8-byte group; unpacking
        // yields the byte followed by six zero-padding bytes.
        let packed = pack(&[0xAB]);
        assert_eq!(packed.len(), 8);
        let unpacked = unpack(&packed).unwrap();
        assert_eq!(unpacked[0], 0xAB);
        assert_eq!(&unpacked[1..], &[0u8; 6]);
    }
}
