//! Block-address cipher.
//!
//! A 16-bit LFSR-style word cipher applied over an entire 4 KiB block,
//! whose initial key state is derived from the block's destination flash
//! address. Applying it twice with the same base block number is the
//! identity, so the same function serves both encrypt and decrypt.

use byteorder::{ByteOrder, LittleEndian};

use crate::types::BLOCK_LEN;

/// Magic initial key state used when `base_block_number` is zero.
const ZERO_BLOCK_MAGIC: u16 = 0x545A;

/// LFSR feedback polynomial.
const FEEDBACK: u16 = 0x8005;

/// Apply the block-address cipher to a 4096-byte block in place.
///
/// `base_block_number` is `flash_address >> 12`. The cipher operates on
/// consecutive little-endian 16-bit words; each word is XORed with the
/// evolving key state after it advances one LFSR step.
///
/// The reference pseudocode includes a rotate step after the XOR, but that
/// rotate is always a no-op: the preceding XOR with the low bit set always
/// clears bit 0 of the state, so "rotate right by one" and "shift right by
/// one" agree. This implementation uses the simplified shift-only form.
pub fn apply(block: &mut [u8; BLOCK_LEN], base_block_number: u16) {
    let mut key = if base_block_number != 0 {
        base_block_number
    } else {
        ZERO_BLOCK_MAGIC
    };

    for word in block.chunks_exact_mut(2) {
        if key & 1 != 0 {
            key ^= FEEDBACK;
        }
        key >>= 1;

        let plain = LittleEndian::read_u16(word);
        LittleEndian::write_u16(word, plain ^ key);
    }
}
