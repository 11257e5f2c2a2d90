//! Firmware assembler: decode-side sub-block accumulation and encode-side
//! stream generation (§4.6, §4.7).

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};

use crate::address_cipher;
use crate::bitpack;
use crate::envelope;
use crate::error::{CodecError, Result};
use crate::profile;
use crate::types::{
    DeviceProfile, FirmwareBundle, FlashBlock, FlashBlockMap, FormatTag, ProfileMatch, SysExEvent,
    BLOCK_LEN, BROADCAST_DEVICE_ID, CMD_WRITE_FLASH_BLOCK, DISPLAY_MESSAGE_SUB_BLOCK,
    MAX_BLOCK_INDEX, SUB_BLOCKS_PER_BLOCK, SUB_BLOCK_LEN,
};
use crate::xor;

/// Accumulates sub-blocks from a stream of accepted firmware-write events
/// into a sparse flash block map, deciding the device profile lazily on
/// the first such event.
pub struct Assembler {
    profile: Option<&'static DeviceProfile>,
    profile_match: Option<ProfileMatch>,
    model_id: Option<u8>,
    sub_blocks: BTreeMap<u16, [u8; SUB_BLOCK_LEN]>,
    messages: BTreeMap<usize, String>,
    accepted: usize,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            profile: None,
            profile_match: None,
            model_id: None,
            sub_blocks: BTreeMap::new(),
            messages: BTreeMap::new(),
            accepted: 0,
        }
    }

    /// Feed one parsed SysEx event. Events whose command is not
    /// "write flash block" are logged and skipped; this assembler only
    /// models that one command.
    pub fn accept(&mut self, event: &SysExEvent) -> Result<()> {
        if event.command != CMD_WRITE_FLASH_BLOCK {
            tracing::debug!(
                command = format!("{:#04x}", event.command),
                "skipping SysEx event: unknown command"
            );
            return Ok(());
        }

        let unpacked = bitpack::unpack(&event.payload)?;

        if self.profile.is_none() {
            let (profile, how) = profile::identify(&unpacked, event.model_id)?;
            self.profile = Some(profile);
            self.profile_match = Some(how);
            self.model_id = Some(event.model_id);
        }
        let profile = self.profile.expect("profile set above");

        let mut decrypted = unpacked;
        xor::xor_in_place(profile.midi_key, &mut decrypted);
        if decrypted.len() < 3 + SUB_BLOCK_LEN {
            return Err(CodecError::BadLength {
                expected: 3 + SUB_BLOCK_LEN,
                actual: decrypted.len(),
            });
        }

        let sub_no = BigEndian::read_u16(&decrypted[0..2]);
        let claimed_checksum = decrypted[2];
        let mut data = [0u8; SUB_BLOCK_LEN];
        data.copy_from_slice(&decrypted[3..3 + SUB_BLOCK_LEN]);

        if sub_no == DISPLAY_MESSAGE_SUB_BLOCK {
            // Tagged with the count of real sub-block events accepted so
            // far, not a running count of every accepted event — this is
            // the same ordinal space the encoder schedules messages in, so
            // a message queued at ordinal k round-trips to key k on decode.
            let ordinal = self.accepted;
            let text_len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            let text = String::from_utf8_lossy(&data[..text_len]).into_owned();
            tracing::debug!(ordinal, %text, "display message received");
            self.messages.insert(ordinal, text);
            return Ok(());
        }

        let computed = profile.checksum_variant.compute(&data)?;
        if computed != claimed_checksum {
            return Err(CodecError::ChecksumMismatch {
                sub_block: sub_no,
                expected: claimed_checksum,
                actual: computed,
            });
        }

        self.sub_blocks.insert(sub_no, data);
        self.accepted += 1;
        Ok(())
    }

    /// Consume the assembler and produce the finished bundle. Concatenates
    /// every fully-present block's 16 sub-blocks, applying the
    /// block-address decipher where the identified profile's encrypted
    /// range covers that block. A block with any absent sub-block is
    /// omitted entirely, never zero-filled.
    pub fn finish(self) -> FirmwareBundle {
        let mut blocks = FlashBlockMap::new();

        for block_index in 0..=MAX_BLOCK_INDEX {
            let base = (block_index as u16) << 4;
            let mut buf = [0u8; BLOCK_LEN];
            let mut complete = true;

            for slot in 0..SUB_BLOCKS_PER_BLOCK {
                match self.sub_blocks.get(&(base + slot)) {
                    Some(payload) => {
                        let offset = slot as usize * SUB_BLOCK_LEN;
                        buf[offset..offset + SUB_BLOCK_LEN].copy_from_slice(payload);
                    }
                    None => {
                        complete = false;
                        break;
                    }
                }
            }

            if !complete {
                continue;
            }

            if let Some(profile) = self.profile {
                if profile.encrypted_range.contains(&block_index) {
                    address_cipher::apply(&mut buf, block_index as u16);
                }
            }

            blocks.insert(block_index, FlashBlock::new(block_index, buf));
        }

        FirmwareBundle {
            profile: self.profile,
            profile_match: self.profile_match,
            blocks,
            format: FormatTag::SysEx,
            messages: self.messages,
            model_id: self.model_id,
        }
    }
}

/// Decode a whole stream of already-parsed SysEx events into a bundle.
pub fn decode_events(events: &[SysExEvent]) -> Result<FirmwareBundle> {
    let mut assembler = Assembler::new();
    for event in events {
        assembler.accept(event)?;
    }
    Ok(assembler.finish())
}

/// Compose the unencrypted `[subHi, subLo, checksum] ++ payload` record for
/// one sub-block, 259 bytes.
fn compose_record(
    profile: &DeviceProfile,
    sub_no: u16,
    payload: &[u8; SUB_BLOCK_LEN],
) -> Result<Vec<u8>> {
    let checksum = profile.checksum_variant.compute(payload)?;
    let mut record = vec![0u8; 3 + SUB_BLOCK_LEN];
    BigEndian::write_u16(&mut record[0..2], sub_no);
    record[2] = checksum;
    record[3..].copy_from_slice(payload);
    Ok(record)
}

/// Build the full wire bytes (SysEx event) for one sub-block: compose,
/// XOR-encrypt with the MIDI-block key, 7/8-pack, and frame.
fn build_sub_block_event(
    profile: &DeviceProfile,
    sub_no: u16,
    payload: &[u8; SUB_BLOCK_LEN],
) -> Result<Vec<u8>> {
    let mut encrypted = compose_record(profile, sub_no, payload)?;
    xor::xor_in_place(profile.midi_key, &mut encrypted);
    let packed = bitpack::pack(&encrypted);
    Ok(envelope::build_event(
        BROADCAST_DEVICE_ID,
        profile.model_id,
        CMD_WRITE_FLASH_BLOCK,
        &packed,
    ))
}

fn display_message_payload(text: &str) -> [u8; SUB_BLOCK_LEN] {
    let mut payload = [0u8; SUB_BLOCK_LEN];
    let bytes = text.as_bytes();
    let n = bytes.len().min(SUB_BLOCK_LEN);
    payload[..n].copy_from_slice(&bytes[..n]);
    payload
}

fn build_display_message_event(profile: &DeviceProfile, text: &str) -> Result<Vec<u8>> {
    let payload = display_message_payload(text);
    build_sub_block_event(profile, DISPLAY_MESSAGE_SUB_BLOCK, &payload)
}

/// Encode a cleartext buffer as a stream of SysEx events.
///
/// `data` need not already be 4 KiB-aligned in length; it is padded with
/// `0xFF`. `messages` maps a sub-block ordinal (0-based, over the
/// resulting stream of accepted firmware events including display
/// messages themselves) to display text queued to be emitted just before
/// that ordinal's regular sub-block, or after the very last one.
pub fn encode(
    profile: &'static DeviceProfile,
    address: u32,
    data: &[u8],
    messages: &BTreeMap<usize, String>,
) -> Result<Vec<u8>> {
    if address % BLOCK_LEN as u32 != 0 {
        return Err(CodecError::UnalignedAddress(address));
    }

    let mut buffer = if address == profile.application_region_start {
        xor::xor(profile.app_key, data)
    } else {
        data.to_vec()
    };
    let pad = (BLOCK_LEN - buffer.len() % BLOCK_LEN) % BLOCK_LEN;
    buffer.resize(buffer.len() + pad, 0xFF);

    let base_block = (address >> 12) as u8;
    let block_count = buffer.len() / BLOCK_LEN;

    let mut out = Vec::new();
    let mut ordinal = 0usize;

    for i in 0..block_count {
        let block_index = base_block.wrapping_add(i as u8);
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(&buffer[i * BLOCK_LEN..(i + 1) * BLOCK_LEN]);

        if profile.encrypted_range.contains(&block_index) {
            address_cipher::apply(&mut block, block_index as u16);
        }

        for slot in 0..SUB_BLOCKS_PER_BLOCK {
            if let Some(text) = messages.get(&ordinal) {
                out.extend(build_display_message_event(profile, text)?);
            }
            ordinal += 1;

            let sub_no = ((block_index as u16) << 4) | slot;
            let offset = slot as usize * SUB_BLOCK_LEN;
            let mut payload = [0u8; SUB_BLOCK_LEN];
            payload.copy_from_slice(&block[offset..offset + SUB_BLOCK_LEN]);
            out.extend(build_sub_block_event(profile, sub_no, &payload)?);
        }
    }

    if let Some(text) = messages.get(&ordinal) {
        out.extend(build_display_message_event(profile, text)?);
    }

    Ok(out)
}
