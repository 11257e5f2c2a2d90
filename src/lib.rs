//! fwcodec - firmware codec for Behringer DEQ-family signal processors
//!
//! This library implements the wire format and flash-image layout used by
//! this device family's MIDI SysEx firmware updater: a 7/8 bit-packer for
//! MSB-clear transport, a repeating-key XOR stream cipher, a bit-serial
//! sub-block checksum, a 16-bit block-address cipher, a SysEx envelope
//! parser/builder, a device-profile registry, a firmware assembler, and an
//! image partitioner.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use fwcodec::{decode, partition, types::RenderPolicy};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let data = std::fs::read("capture.syx")?;
//!     let bundle = decode(&data)?;
//!     let images = partition(&bundle, RenderPolicy::GapSensitive)?;
//!     for image in &images {
//!         println!("{:?}: {} bytes", image.label, image.data.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module layout
//!
//! - [`bitpack`] — 7/8 MIDI-safe bit packer.
//! - [`xor`] — repeating-key XOR stream cipher.
//! - [`checksum`] — bit-serial sub-block checksum.
//! - [`address_cipher`] — 16-bit block-address cipher.
//! - [`envelope`] — SysEx event parser/builder and format detector.
//! - [`profile`] — device profile registry and identification.
//! - [`assembler`] — firmware stream decode/encode.
//! - [`partition`] — flash-layout-aware image partitioner.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_arguments)]

pub mod address_cipher;
pub mod assembler;
pub mod bitpack;
pub mod checksum;
pub mod envelope;
pub mod error;
pub mod partition;
pub mod profile;
pub mod types;
pub mod xor;

#[cfg(feature = "cli")]
pub mod formatter;

pub use error::{CodecError, Result};
pub use types::{
    ChecksumVariant, DeviceProfile, FirmwareBundle, FormatTag, ImageLabel, NamedImage,
    ProfileMatch, RenderPolicy, SysExEvent,
};

use std::collections::BTreeMap;

/// Decode a byte buffer into a [`FirmwareBundle`].
///
/// Detects whether `data` is a framed SysEx capture or a raw flash dump
/// (via [`envelope::looks_like_sysex`]) and dispatches accordingly. A raw
/// dump is split into 4 KiB blocks directly; its device profile, if any,
/// is identified by firmware signature rather than by MIDI-key trial
/// decoding, since there is no wire-level cipher layer to trial-decode.
pub fn decode(data: &[u8]) -> Result<FirmwareBundle> {
    if envelope::looks_like_sysex(data) {
        let events = envelope::parse_events(data);
        assembler::decode_events(&events)
    } else {
        Ok(decode_raw_binary(data))
    }
}

fn decode_raw_binary(data: &[u8]) -> FirmwareBundle {
    use types::{FlashBlock, FlashBlockMap, BLOCK_LEN};

    let mut blocks = FlashBlockMap::new();
    for (i, chunk) in data.chunks(types::BLOCK_LEN).enumerate() {
        if chunk.len() < BLOCK_LEN || i > types::MAX_BLOCK_INDEX as usize {
            break;
        }
        let mut buf = [0u8; BLOCK_LEN];
        buf.copy_from_slice(chunk);
        blocks.insert(i as u8, FlashBlock::new(i as u8, buf));
    }

    let profile = profile::identify_by_signature(&blocks);

    let mut deciphered = FlashBlockMap::new();
    for (index, block) in blocks {
        let mut buf = *block.as_bytes();
        if let Some(p) = profile {
            if p.encrypted_range.contains(&index) {
                address_cipher::apply(&mut buf, index as u16);
            }
        }
        deciphered.insert(index, FlashBlock::new(index, buf));
    }

    FirmwareBundle {
        profile,
        profile_match: None,
        blocks: deciphered,
        format: FormatTag::RawBinary,
        messages: BTreeMap::new(),
        model_id: None,
    }
}

/// Encode a cleartext buffer for one device profile into a stream of
/// SysEx events.
pub fn encode(
    profile: &'static DeviceProfile,
    address: u32,
    data: &[u8],
    messages: &BTreeMap<usize, String>,
) -> Result<Vec<u8>> {
    assembler::encode(profile, address, data, messages)
}

/// Render a decoded bundle's flash-layout map into named logical images.
pub fn partition(
    bundle: &FirmwareBundle,
    policy: RenderPolicy,
) -> Result<Vec<types::NamedImage>> {
    partition::partition(bundle, policy)
}

/// Library version, as set by Cargo at build time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_decode_empty_buffer_is_raw_and_empty() {
        let bundle = decode(&[]).unwrap();
        assert_eq!(bundle.format, FormatTag::RawBinary);
        assert!(bundle.blocks.is_empty());
        assert!(bundle.profile.is_none());
    }

    #[test]
    fn test_decode_encode_round_trip_via_top_level_api() {
        let profile = profile::by_name("primary-2004").unwrap();
        let data = vec![0xABu8; types::BLOCK_LEN];
        let wire = encode(profile, 0x74000, &data, &BTreeMap::new()).unwrap();
        let bundle = decode(&wire).unwrap();
        let block = bundle.blocks.get(&0x74).unwrap();
        assert_eq!(block.as_bytes().as_ref(), data.as_slice());
    }

    #[test]
    fn test_decode_raw_binary_identifies_by_signature() {
        use types::BLOCK_LEN;

        let mut image = vec![0u8; 3 * BLOCK_LEN];
        image[2 * BLOCK_LEN + 0x020..2 * BLOCK_LEN + 0x020 + 3].copy_from_slice(b"SIG");
        let bundle = decode(&image).unwrap();
        assert_eq!(bundle.format, FormatTag::RawBinary);
        assert_eq!(bundle.profile.unwrap().name, "secondary");
    }
}
