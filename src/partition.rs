//! Image partitioner.
//!
//! Turns a sparse flash block map plus a device profile's flash-layout
//! table into named logical images (§4.8), and recovers the cleartext
//! application key from a decrypted bootloader when one is available.

use std::ops::RangeInclusive;

use crate::error::{CodecError, Result};
use crate::profile;
use crate::types::{
    DeviceProfile, FirmwareBundle, FlashBlockMap, ImageLabel, NamedImage, RenderPolicy, BLOCK_LEN,
};
use crate::xor;

/// Render every labeled range in `profile`'s layout into a [`NamedImage`],
/// plus a second, XOR-decrypted image for the application region.
pub fn partition(bundle: &FirmwareBundle, policy: RenderPolicy) -> Result<Vec<NamedImage>> {
    let profile = bundle
        .profile
        .ok_or_else(|| CodecError::UnsupportedDevice("no device profile identified".into()))?;

    let mut images = Vec::with_capacity(profile.layout.len() + 1);
    for entry in profile.layout {
        if entry.label == ImageLabel::ApplicationEncrypted {
            let encrypted = render_range(&bundle.blocks, entry.range.clone(), policy);
            let key = recover_application_key(profile, &bundle.blocks);
            let decrypted = xor::xor(&key, &encrypted);

            if !decrypted_application_looks_valid(profile, &decrypted) {
                tracing::debug!(
                    profile = profile.name,
                    "recovered application key did not reproduce the expected signature"
                );
            }

            images.push(NamedImage {
                label: ImageLabel::ApplicationEncrypted,
                data: encrypted,
                policy,
            });
            images.push(NamedImage {
                label: ImageLabel::ApplicationDecrypted,
                data: decrypted,
                policy,
            });
        } else {
            let data = render_range(&bundle.blocks, entry.range.clone(), policy);
            images.push(NamedImage {
                label: entry.label,
                data,
                policy,
            });
        }
    }
    Ok(images)
}

/// Render one labeled byte range from the sparse block map.
fn render_range(blocks: &FlashBlockMap, range: RangeInclusive<u32>, policy: RenderPolicy) -> Vec<u8> {
    let start_block = (*range.start() >> 12) as u8;
    let end_block = (*range.end() >> 12) as u8;

    let mut out = Vec::new();
    match policy {
        RenderPolicy::GapFill => {
            for index in start_block..=end_block {
                match blocks.get(&index) {
                    Some(block) => out.extend_from_slice(block.as_bytes().as_ref()),
                    None => out.extend(std::iter::repeat(0xFFu8).take(BLOCK_LEN)),
                }
            }
        }
        RenderPolicy::GapSensitive => {
            let mut started = false;
            for index in start_block..=end_block {
                match blocks.get(&index) {
                    Some(block) => {
                        out.extend_from_slice(block.as_bytes().as_ref());
                        started = true;
                    }
                    None => {
                        if started {
                            break;
                        }
                        // Haven't emitted anything yet: keep scanning for
                        // the first present block in the range.
                    }
                }
            }
        }
    }
    out
}

/// Recover the cleartext application XOR key. Prefers extracting it from a
/// decrypted bootloader (blocks 0..3) when present; falls back to the
/// profile's own default application key.
pub fn recover_application_key(profile: &DeviceProfile, blocks: &FlashBlockMap) -> Vec<u8> {
    if (0u8..4).all(|i| blocks.contains_key(&i)) {
        if let Some(key) = recover_from_bootloader(profile, blocks) {
            return key;
        }
    }
    profile.app_key.to_vec()
}

fn recover_from_bootloader(profile: &DeviceProfile, blocks: &FlashBlockMap) -> Option<Vec<u8>> {
    let mut bootloader = Vec::with_capacity(4 * BLOCK_LEN);
    for i in 0u8..4 {
        bootloader.extend_from_slice(blocks.get(&i)?.as_bytes().as_ref());
    }

    let (key_off, key_len) = profile.bootloader_offsets.bootloader_key;
    let (enc_off, enc_len) = profile.bootloader_offsets.encrypted_app_key;
    if bootloader.len() < key_off + key_len || bootloader.len() < enc_off + enc_len {
        return None;
    }

    let bootloader_key = &bootloader[key_off..key_off + key_len];
    let mut app_key = bootloader[enc_off..enc_off + enc_len].to_vec();
    xor::xor_in_place(bootloader_key, &mut app_key);
    Some(app_key)
}

/// Check a decrypted application image against the known decrypted-
/// application signature, accounting for the profile's application region
/// possibly starting before the signature's absolute block index.
fn decrypted_application_looks_valid(profile: &DeviceProfile, decrypted: &[u8]) -> bool {
    let Some(app_entry) = profile
        .layout
        .iter()
        .find(|e| e.label == ImageLabel::ApplicationEncrypted)
    else {
        return false;
    };
    let start_block = (*app_entry.range.start() >> 12) as u8;
    let sig = profile::DECRYPTED_APP_SIGNATURE;
    if sig.block_index < start_block {
        return false;
    }

    let block_offset = (sig.block_index - start_block) as usize * BLOCK_LEN + sig.offset;
    let end = block_offset + sig.bytes.len();
    decrypted.len() >= end && &decrypted[block_offset..end] == sig.bytes
}
