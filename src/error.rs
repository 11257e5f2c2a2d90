//! Error types for the firmware codec.
//!
//! This module defines every error the codec can produce while packing,
//! ciphering, framing, and assembling firmware images. Envelope-level
//! corruption (unknown vendor, unknown command, trailing garbage) is
//! logged and skipped by the caller rather than surfaced as one of these
//! — see [`crate::envelope`].

use thiserror::Error;

/// Primary error type for `fwcodec`.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A SysEx event was missing its start/end sentinel, was truncated, or
    /// carried an unrecognized vendor tag.
    #[error("malformed SysEx envelope: {0}")]
    MalformedEnvelope(String),

    /// A length precondition was violated (7/8-unpack input not a multiple
    /// of 8, or a checksum input was not exactly 256 bytes).
    #[error("bad length: expected {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },

    /// A sub-block's transmitted checksum did not match recomputation.
    #[error(
        "checksum mismatch for sub-block {sub_block:#06x}: expected {expected:#04x}, got {actual:#04x}"
    )]
    ChecksumMismatch {
        sub_block: u16,
        expected: u8,
        actual: u8,
    },

    /// A SysEx event carried a command ID the codec does not handle.
    ///
    /// Logged and skipped by the envelope layer; surfaced here only for
    /// callers that want to inspect the skip reason directly.
    #[error("unknown command: {0:#04x}")]
    UnknownCommand(u8),

    /// Firmware could not be attributed to a single device profile.
    #[error("ambiguous device profile: {} candidates matched model id {model_id:#04x}", candidates.len())]
    AmbiguousProfile {
        candidates: Vec<&'static str>,
        model_id: u8,
    },

    /// Firmware could not be attributed to any device profile.
    #[error("unknown device profile for model id {0:#04x}")]
    UnknownProfile(u8),

    /// Encode was requested for a device profile not present in the
    /// registry.
    #[error("unsupported device profile: {0}")]
    UnsupportedDevice(String),

    /// The flash address supplied to encode was not aligned to 0x1000.
    #[error("address {0:#x} is not 4 KiB-aligned")]
    UnalignedAddress(u32),

    /// An underlying I/O operation failed (CLI front-end only).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout `fwcodec`.
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_display() {
        let err = CodecError::ChecksumMismatch {
            sub_block: 0x0040,
            expected: 0x47,
            actual: 0x00,
        };
        let msg = err.to_string();
        assert!(msg.contains("0040"));
        assert!(msg.contains("47"));
    }

    #[test]
    fn test_bad_length_display() {
        let err = CodecError::BadLength {
            expected: 256,
            actual: 12,
        };
        assert!(err.to_string().contains("256"));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_ambiguous_profile_display() {
        let err = CodecError::AmbiguousProfile {
            candidates: vec!["profile-a", "profile-b"],
            model_id: 0x20,
        };
        let msg = err.to_string();
        assert!(msg.contains('2'));
        assert!(msg.contains("20"));
    }
}
