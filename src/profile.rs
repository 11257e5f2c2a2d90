//! Device profile registry.
//!
//! Concrete, immutable [`DeviceProfile`] records for the device families
//! this codec knows about, plus the two identification procedures: trial
//! decoding against a live SysEx stream (§4.6), and signature matching
//! against a raw flash image (component 7).

use crate::error::{CodecError, Result};
use crate::types::{
    BootloaderOffsets, ChecksumVariant, DeviceProfile, FlashBlockMap, ImageLabel, LayoutEntry,
    ProfileMatch, Signature, SUB_BLOCK_LEN,
};
use crate::xor;

/// Bootloader field offsets shared by every profile in the primary family.
/// Absolute flash offsets; the bootloader occupies flash addresses
/// `0x0000..0x4000`, so these double as byte indices into a 16 KiB
/// bootloader buffer.
const BOOTLOADER_OFFSETS: BootloaderOffsets = BootloaderOffsets {
    bootloader_key: (0x3002, 56),
    encrypted_app_key: (0x303A, 56),
    midi_update_key: (0x2C84, 5),
    lcd_banner: (0x308A, 25),
    model_tag: (0x2C94, 25),
};

const PRIMARY_LAYOUT: &[LayoutEntry] = &[
    LayoutEntry {
        label: ImageLabel::Bootloader,
        range: 0x00000..=0x03FFF,
    },
    LayoutEntry {
        label: ImageLabel::ApplicationEncrypted,
        range: 0x04000..=0x5AFFF,
    },
    LayoutEntry {
        label: ImageLabel::Unused,
        range: 0x5B000..=0x73FFF,
    },
    LayoutEntry {
        label: ImageLabel::Presets,
        range: 0x74000..=0x7BFFF,
    },
    LayoutEntry {
        label: ImageLabel::Scratch,
        range: 0x7C000..=0x7DFFF,
    },
    LayoutEntry {
        label: ImageLabel::DeviceData,
        range: 0x7E000..=0x7FFFF,
    },
];

/// Shifted layout for the secondary profile. Only the application region's
/// bounds are given; the bootloader is kept at its primary size (0..0x3FFF,
/// blocks 0..3) since the bootloader-offset table above is keyed to that
/// range, and the bootloader never sits inside the block-address-cipher
/// range regardless of profile. The secondary profile's signature tag at
/// block 2 offset `0x020` does fall inside that bootloader range, so its
/// "SIG" marker and the primary family's "primary-v2" banner occupy the
/// same block without conflict — they're matched independently, and a real
/// image would only ever carry one.
const SECONDARY_LAYOUT: &[LayoutEntry] = &[
    LayoutEntry {
        label: ImageLabel::Bootloader,
        range: 0x00000..=0x03FFF,
    },
    LayoutEntry {
        label: ImageLabel::ApplicationEncrypted,
        range: 0x02000..=0x5EFFF,
    },
    LayoutEntry {
        label: ImageLabel::Unused,
        range: 0x5F000..=0x71FFF,
    },
    LayoutEntry {
        label: ImageLabel::Presets,
        range: 0x72000..=0x79FFF,
    },
    LayoutEntry {
        label: ImageLabel::Scratch,
        range: 0x7A000..=0x7BFFF,
    },
    LayoutEntry {
        label: ImageLabel::DeviceData,
        range: 0x7C000..=0x7DFFF,
    },
];

const PRIMARY_V2_SIGNATURE: Signature = Signature {
    block_index: 2,
    offset: 0xC94,
    bytes: b"DEQ2496V2 BOOTLOADER V2.2",
};

const SECONDARY_SIGNATURE: Signature = Signature {
    block_index: 2,
    offset: 0x020,
    bytes: b"SIG",
};

/// Signature of a successfully-recovered decrypted application image, read
/// at the very start of the application region rather than from a
/// per-profile `signatures` table. Used by the partitioner to confirm the
/// recovered application key, not for profile identification.
pub const DECRYPTED_APP_SIGNATURE: Signature = Signature {
    block_index: 4,
    offset: 0x01C,
    bytes: b"COPY",
};

/// Model ID byte shared by the 2004/2002 MIDI-key variants. Not specified
/// by name anywhere; chosen as a stand-in wire value consistent with the
/// rest of the primary family.
const PRIMARY_MODEL_ID: u8 = 0x20;

/// Model ID byte for the secondary, shifted-layout family.
const SECONDARY_MODEL_ID: u8 = 0x21;

/// 2004-keyed primary profile.
pub static PROFILE_PRIMARY_2004: DeviceProfile = DeviceProfile {
    name: "primary-2004",
    model_id: PRIMARY_MODEL_ID,
    checksum_variant: ChecksumVariant::Standard,
    midi_key: b"TZ'04",
    app_key: b"- ORIGINAL BEHRINGER CODE - COPYRIGHT 2004 - BGER/TZ - \0",
    encrypted_range: 0x04..=0x5A,
    layout: PRIMARY_LAYOUT,
    signatures: &[PRIMARY_V2_SIGNATURE],
    bootloader_offsets: BOOTLOADER_OFFSETS,
    application_region_start: 0x04000,
};

/// 2002-keyed primary profile. Shares a model ID with
/// [`PROFILE_PRIMARY_2004`] — the pair this crate's checksum-trial
/// disambiguation exists for.
pub static PROFILE_PRIMARY_2002: DeviceProfile = DeviceProfile {
    name: "primary-2002",
    model_id: PRIMARY_MODEL_ID,
    checksum_variant: ChecksumVariant::Standard,
    midi_key: b"TZ'02",
    app_key: b"- ORIGINAL BEHRINGER CODE - COPYRIGHT 2002 - BGER/TZ - \0",
    encrypted_range: 0x04..=0x5A,
    layout: PRIMARY_LAYOUT,
    signatures: &[],
    bootloader_offsets: BOOTLOADER_OFFSETS,
    application_region_start: 0x04000,
};

/// Secondary, shifted-layout profile. No distinct MIDI/application keys are
/// documented for it, so it reuses the 2004 variant's keys; only its layout,
/// model ID, and identifying signature differ.
pub static PROFILE_SECONDARY: DeviceProfile = DeviceProfile {
    name: "secondary",
    model_id: SECONDARY_MODEL_ID,
    checksum_variant: ChecksumVariant::Standard,
    midi_key: b"TZ'04",
    app_key: b"- ORIGINAL BEHRINGER CODE - COPYRIGHT 2004 - BGER/TZ - \0",
    encrypted_range: 0x02..=0x5E,
    layout: SECONDARY_LAYOUT,
    signatures: &[SECONDARY_SIGNATURE],
    bootloader_offsets: BOOTLOADER_OFFSETS,
    application_region_start: 0x02000,
};

/// Every known device profile, in trial-decode order.
pub static REGISTRY: &[&DeviceProfile] = &[
    &PROFILE_PRIMARY_2004,
    &PROFILE_PRIMARY_2002,
    &PROFILE_SECONDARY,
];

/// Look up a profile by its diagnostic name (as accepted by the `encode`
/// CLI subcommand).
pub fn by_name(name: &str) -> Option<&'static DeviceProfile> {
    REGISTRY.iter().copied().find(|p| p.name == name)
}

/// Identify the device profile for a live firmware-write event.
///
/// `unpacked_ciphertext` is the 7/8-unpacked, still-MIDI-key-encrypted
/// `[subHi, subLo, checksum, data...]` record. Each registry profile is
/// trial-decoded in order; the first whose checksum byte matches its own
/// computed checksum over the decrypted data wins. If none match, the
/// decoder falls back to whichever profile uniquely carries
/// `observed_model_id`.
pub fn identify(
    unpacked_ciphertext: &[u8],
    observed_model_id: u8,
) -> Result<(&'static DeviceProfile, ProfileMatch)> {
    let header_len = 3;
    for &profile in REGISTRY {
        if unpacked_ciphertext.len() < header_len + SUB_BLOCK_LEN {
            continue;
        }
        let decrypted = xor::xor(profile.midi_key, unpacked_ciphertext);
        let claimed_checksum = decrypted[2];
        let data = &decrypted[header_len..header_len + SUB_BLOCK_LEN];
        if let Ok(computed) = profile.checksum_variant.compute(data) {
            if computed == claimed_checksum {
                return Ok((profile, ProfileMatch::Checksum));
            }
        }
    }

    let candidates: Vec<&'static DeviceProfile> = REGISTRY
        .iter()
        .copied()
        .filter(|p| p.model_id == observed_model_id)
        .collect();

    match candidates.len() {
        1 => Ok((candidates[0], ProfileMatch::ModelIdFallback)),
        0 => Err(CodecError::UnknownProfile(observed_model_id)),
        _ => Err(CodecError::AmbiguousProfile {
            candidates: candidates.iter().map(|p| p.name).collect(),
            model_id: observed_model_id,
        }),
    }
}

/// Identify a device profile from a raw, already-assembled flash map by
/// matching each candidate's firmware signatures against the corresponding
/// block's cleartext bytes. Bootloader blocks are never block-cipher
/// encrypted, so signature bytes can be compared directly.
pub fn identify_by_signature(blocks: &FlashBlockMap) -> Option<&'static DeviceProfile> {
    for &profile in REGISTRY {
        for sig in profile.signatures {
            let Some(block) = blocks.get(&sig.block_index) else {
                continue;
            };
            let bytes = block.as_bytes();
            let end = sig.offset + sig.bytes.len();
            if end <= bytes.len() && &bytes[sig.offset..end] == sig.bytes {
                return Some(profile);
            }
        }
    }
    None
}
