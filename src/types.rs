//! Core types for the firmware codec.
//!
//! This module defines the data model shared across the bit-level codecs,
//! the envelope parser/builder, the firmware assembler, and the image
//! partitioner: flash addressing units, the SysEx wire record, device
//! profiles, and the decode/partition output types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Size in bytes of one flash block.
pub const BLOCK_LEN: usize = 4096;

/// Size in bytes of one sub-block payload.
pub const SUB_BLOCK_LEN: usize = 256;

/// Number of 256-byte sub-blocks that make up one 4 KiB block.
pub const SUB_BLOCKS_PER_BLOCK: u16 = 16;

/// Highest valid flash block index (blocks 0..=0x7F span the full 512 KiB
/// chip addressed by this family).
pub const MAX_BLOCK_INDEX: u8 = 0x7F;

/// Reserved sub-block number carrying LCD display-message payload instead
/// of flash data.
pub const DISPLAY_MESSAGE_SUB_BLOCK: u16 = 0xFF00;

/// SysEx start sentinel.
pub const SYSEX_START: u8 = 0xF0;

/// SysEx end sentinel.
pub const SYSEX_END: u8 = 0xF7;

/// Three-byte vendor identifier required in every well-formed event.
pub const VENDOR_TAG: [u8; 3] = [0x00, 0x20, 0x32];

/// Device ID meaning "broadcast to all devices on the bus".
pub const BROADCAST_DEVICE_ID: u8 = 0x7F;

/// Command ID for "write flash block".
pub const CMD_WRITE_FLASH_BLOCK: u8 = 0x34;

/// An immutable 4 KiB flash block, tagged with its block index
/// (`flash_address >> 12`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashBlock {
    index: u8,
    data: Box<[u8; BLOCK_LEN]>,
}

impl FlashBlock {
    /// Build a flash block from its index and raw bytes.
    pub fn new(index: u8, data: [u8; BLOCK_LEN]) -> Self {
        Self {
            index,
            data: Box::new(data),
        }
    }

    /// The block's index within the sparse flash map.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// The block's raw 4096 bytes.
    pub fn as_bytes(&self) -> &[u8; BLOCK_LEN] {
        &self.data
    }
}

/// Sparse mapping from block index to the block's content. Absent indices
/// mean "not touched by this update" — never zero-fill them implicitly.
pub type FlashBlockMap = BTreeMap<u8, FlashBlock>;

/// A 256-byte transport unit plus its 16-bit sub-block number.
#[derive(Debug, Clone)]
pub struct SubBlock {
    /// Sub-block number. `(block_index << 4) | slot`, or
    /// [`DISPLAY_MESSAGE_SUB_BLOCK`] for an out-of-band display message.
    pub number: u16,
    /// The 256-byte payload.
    pub payload: [u8; SUB_BLOCK_LEN],
}

impl SubBlock {
    /// `true` if this sub-block carries LCD display-message text rather
    /// than flash data.
    pub fn is_display_message(&self) -> bool {
        self.number == DISPLAY_MESSAGE_SUB_BLOCK
    }

    /// The parent flash block index, or `None` for a display message.
    pub fn block_index(&self) -> Option<u8> {
        if self.is_display_message() {
            None
        } else {
            Some((self.number >> 4) as u8)
        }
    }

    /// The slot (0..16) within the parent block, or `None` for a display
    /// message.
    pub fn slot(&self) -> Option<u8> {
        if self.is_display_message() {
            None
        } else {
            Some((self.number & 0x0F) as u8)
        }
    }
}

/// A framed SysEx record as defined in the wire-format table: vendor tag,
/// device/model/command bytes, and an MSB-clear payload. Sentinels are not
/// stored here — they are added/stripped by the envelope layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysExEvent {
    /// Destination device ID (0..0x7E, or [`BROADCAST_DEVICE_ID`]).
    pub device_id: u8,
    /// Model ID, MSB clear.
    pub model_id: u8,
    /// Command ID, MSB clear.
    pub command: u8,
    /// Payload bytes; every byte has its MSB clear.
    pub payload: Vec<u8>,
}

/// Which checksum routine a device profile uses over a sub-block payload.
///
/// Only one variant is implemented today (§4.3's bit-serial routine); the
/// selector exists because device documentation distinguishes a "CRC" name
/// from this routine's actual behavior, and future device families could
/// introduce a second variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumVariant {
    /// The bit-serial rolling checksum described in §4.3.
    Standard,
}

impl ChecksumVariant {
    /// Compute this variant's checksum over a 256-byte payload.
    pub fn compute(self, payload: &[u8]) -> crate::error::Result<u8> {
        match self {
            ChecksumVariant::Standard => crate::checksum::checksum(payload),
        }
    }
}

/// Byte offsets, within the bootloader image, of fields needed to recover
/// the cleartext application key from a decrypted bootloader (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootloaderOffsets {
    /// Offset and length of the bootloader's own XOR key.
    pub bootloader_key: (usize, usize),
    /// Offset and length of the encrypted application key.
    pub encrypted_app_key: (usize, usize),
    /// Offset and length of the MIDI update (block) key.
    pub midi_update_key: (usize, usize),
    /// Offset and length of the LCD banner text.
    pub lcd_banner: (usize, usize),
    /// Offset and length of the model tag text.
    pub model_tag: (usize, usize),
}

/// A labeled range of the flash-layout map (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageLabel {
    /// The bootloader region.
    Bootloader,
    /// The application region as stored in flash (XOR-obfuscated).
    ApplicationEncrypted,
    /// The application region after XOR-decryption with the recovered
    /// application key. Not a flash-layout range; a derived second image.
    ApplicationDecrypted,
    /// An unused gap between the application and presets regions.
    Unused,
    /// The presets region.
    Presets,
    /// The scratch region.
    Scratch,
    /// Device-specific data (boot bitmap or hardware configuration).
    DeviceData,
}

/// One entry of a device profile's flash-layout table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    /// The logical image this range belongs to.
    pub label: ImageLabel,
    /// Inclusive byte-offset range within the flash address space.
    pub range: RangeInclusive<u32>,
}

/// A firmware-signature matcher: a fixed byte string expected at a
/// specific offset within a specific block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// The block index the signature is read from.
    pub block_index: u8,
    /// Byte offset within that block.
    pub offset: usize,
    /// Expected bytes.
    pub bytes: &'static [u8],
}

/// Immutable per-device-family configuration: keys, checksum variant,
/// encrypted block range, flash layout, and signature matchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Human-readable profile name, used in diagnostics and CLI output.
    pub name: &'static str,
    /// Model ID byte as seen on the wire.
    pub model_id: u8,
    /// Checksum routine this profile uses.
    pub checksum_variant: ChecksumVariant,
    /// MIDI-block XOR key (short ASCII string, trailing NUL significant
    /// if present).
    pub midi_key: &'static [u8],
    /// Application XOR key (56 bytes, trailing NUL significant).
    pub app_key: &'static [u8],
    /// Range of block indices the block-address cipher applies to.
    pub encrypted_range: RangeInclusive<u8>,
    /// Flash-layout table for this profile.
    pub layout: &'static [LayoutEntry],
    /// Firmware-signature matchers used during identification.
    pub signatures: &'static [Signature],
    /// Byte offsets of bootloader fields used to recover the application
    /// key from a decrypted bootloader image.
    pub bootloader_offsets: BootloaderOffsets,
    /// Flash address where the application region begins. Encoding at
    /// this address triggers application-key XOR encryption (§4.7 step 1).
    pub application_region_start: u32,
}

/// Why a [`DeviceProfile`] was selected for a decoded firmware stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMatch {
    /// Selected because trial-decoding its MIDI key produced a valid
    /// checksum on the first sub-block.
    Checksum,
    /// Selected because exactly one profile in the registry carries the
    /// observed model ID, after no candidate's checksum matched.
    ModelIdFallback,
}

/// Whether a decoded stream was raw flash bytes or a framed SysEx capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatTag {
    /// A raw, unframed flash dump.
    RawBinary,
    /// A framed stream of SysEx events.
    SysEx,
}

/// The read-only result of decoding a firmware stream.
#[derive(Debug, Clone)]
pub struct FirmwareBundle {
    /// The identified device profile, or `None` if decoding never reached
    /// a firmware-write event.
    pub profile: Option<&'static DeviceProfile>,
    /// How the profile was identified, if any.
    pub profile_match: Option<ProfileMatch>,
    /// The sparse flash block map recovered from the stream.
    pub blocks: FlashBlockMap,
    /// Whether the input was raw flash bytes or a SysEx capture.
    pub format: FormatTag,
    /// Display messages, keyed by the ordinal of the most recently
    /// accepted firmware event at the time each message was seen.
    pub messages: BTreeMap<usize, String>,
    /// The model ID byte observed in the stream, if any SysEx event was
    /// accepted.
    pub model_id: Option<u8>,
}

impl FirmwareBundle {
    /// An empty bundle with no profile, blocks, or messages.
    pub fn empty(format: FormatTag) -> Self {
        Self {
            profile: None,
            profile_match: None,
            blocks: BTreeMap::new(),
            format,
            messages: BTreeMap::new(),
            model_id: None,
        }
    }
}

/// How a [`NamedImage`] was rendered from a sparse block map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderPolicy {
    /// Stop at the first gap within the range (what the device will
    /// actually update).
    GapSensitive,
    /// Fill gaps with 4 KiB of `0xFF` (a full-chip view).
    GapFill,
}

/// A labeled logical image produced by the image partitioner.
#[derive(Debug, Clone)]
pub struct NamedImage {
    /// Which flash-layout region this image represents.
    pub label: ImageLabel,
    /// The assembled bytes.
    pub data: Vec<u8>,
    /// The rendering policy used to assemble `data`.
    pub policy: RenderPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_block_addressing() {
        let sb = SubBlock {
            number: (0x05 << 4) | 0x03,
            payload: [0u8; SUB_BLOCK_LEN],
        };
        assert_eq!(sb.block_index(), Some(0x05));
        assert_eq!(sb.slot(), Some(0x03));
        assert!(!sb.is_display_message());
    }

    #[test]
    fn test_display_message_sub_block_has_no_address() {
        let sb = SubBlock {
            number: DISPLAY_MESSAGE_SUB_BLOCK,
            payload: [0u8; SUB_BLOCK_LEN],
        };
        assert!(sb.is_display_message());
        assert_eq!(sb.block_index(), None);
        assert_eq!(sb.slot(), None);
    }

    #[test]
    fn test_flash_block_accessors() {
        let data = [0xAAu8; BLOCK_LEN];
        let block = FlashBlock::new(4, data);
        assert_eq!(block.index(), 4);
        assert_eq!(block.as_bytes(), &data);
    }

    #[test]
    fn test_empty_bundle() {
        let bundle = FirmwareBundle::empty(FormatTag::SysEx);
        assert!(bundle.profile.is_none());
        assert!(bundle.blocks.is_empty());
        assert!(bundle.messages.is_empty());
    }
}
