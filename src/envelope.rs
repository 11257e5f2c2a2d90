//! SysEx envelope parser/builder.
//!
//! Extracts well-formed SysEx events from a raw byte stream and builds new
//! ones. The parser is implemented as a small feed-byte state machine
//! (`Searching` / `InEvent`) so a caller could drive it byte-at-a-time off a
//! live stream; [`parse_events`] drives it synchronously over a whole
//! buffer, which is what every caller in this crate needs.

use crate::types::{
    SysExEvent, BROADCAST_DEVICE_ID, SYSEX_END, SYSEX_START, VENDOR_TAG,
};

/// Why a candidate event was not returned from the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The event's terminator byte was a status byte other than `0xF7`.
    BadTerminator(u8),
    /// The event ended before a device ID, model ID, and command byte
    /// could be read.
    TooShort,
    /// The event's three-byte vendor tag did not match [`VENDOR_TAG`].
    WrongVendor([u8; 3]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Waiting for the next `0xF0` start sentinel.
    Searching,
    /// Accumulating bytes until the next status byte (MSB set).
    InEvent,
}

/// A byte-at-a-time SysEx event scanner.
///
/// Mirrors the three states described for the stream decoder: *searching*
/// (this struct's `Searching`), *in-event* (`InEvent`, accumulating
/// payload), and *finalize* (folded into the status-byte branch of
/// [`Self::feed`], which inspects the terminator before yielding).
pub struct EnvelopeScanner {
    state: ScanState,
    buf: Vec<u8>,
}

impl Default for EnvelopeScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeScanner {
    /// Create a scanner awaiting the first `0xF0`.
    pub fn new() -> Self {
        Self {
            state: ScanState::Searching,
            buf: Vec::new(),
        }
    }

    /// Feed one byte. Returns `Some` when this byte completed a candidate
    /// event, either a well-formed [`SysExEvent`] or a [`SkipReason`]
    /// explaining why it was not one.
    pub fn feed(&mut self, byte: u8) -> Option<Result<SysExEvent, SkipReason>> {
        match self.state {
            ScanState::Searching => {
                if byte == SYSEX_START {
                    self.buf.clear();
                    self.state = ScanState::InEvent;
                }
                None
            }
            ScanState::InEvent => {
                if byte & 0x80 != 0 {
                    self.state = ScanState::Searching;
                    Some(self.finalize(byte))
                } else {
                    self.buf.push(byte);
                    None
                }
            }
        }
    }

    fn finalize(&mut self, terminator: u8) -> Result<SysExEvent, SkipReason> {
        if terminator != SYSEX_END {
            return Err(SkipReason::BadTerminator(terminator));
        }
        if self.buf.len() < 6 {
            return Err(SkipReason::TooShort);
        }

        let vendor = [self.buf[0], self.buf[1], self.buf[2]];
        if vendor != VENDOR_TAG {
            return Err(SkipReason::WrongVendor(vendor));
        }

        Ok(SysExEvent {
            device_id: self.buf[3],
            model_id: self.buf[4],
            command: self.buf[5],
            payload: self.buf[6..].to_vec(),
        })
    }
}

/// Scan `data` for well-formed SysEx events, logging and skipping any
/// malformed or non-matching-vendor candidates along the way.
pub fn parse_events(data: &[u8]) -> Vec<SysExEvent> {
    let mut scanner = EnvelopeScanner::new();
    let mut events = Vec::new();

    for &byte in data {
        match scanner.feed(byte) {
            Some(Ok(event)) => events.push(event),
            Some(Err(SkipReason::WrongVendor(vendor))) => {
                tracing::debug!(?vendor, "skipping SysEx event: unrecognized vendor tag");
            }
            Some(Err(SkipReason::BadTerminator(terminator))) => {
                tracing::warn!(
                    terminator = format!("{terminator:#04x}"),
                    "skipping malformed SysEx event: bad terminator"
                );
            }
            Some(Err(SkipReason::TooShort)) => {
                tracing::warn!("skipping malformed SysEx event: truncated before header");
            }
            None => {}
        }
    }

    events
}

/// Build the wire bytes for a SysEx event: `F0 00 20 32 device model
/// command payload F7`.
///
/// The caller guarantees every payload byte has its MSB clear; this
/// function does not re-validate that invariant.
pub fn build_event(device_id: u8, model_id: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.push(SYSEX_START);
    out.extend_from_slice(&VENDOR_TAG);
    out.push(device_id);
    out.push(model_id);
    out.push(command);
    out.extend_from_slice(payload);
    out.push(SYSEX_END);
    out
}

/// Detect whether `data` is a framed SysEx capture rather than a raw flash
/// dump: starts with `0xF0`, ends with `0xF7`, and no interior byte has its
/// MSB set except status bytes (values `>= 0xF0`).
pub fn looks_like_sysex(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }
    if data[0] != SYSEX_START || data[data.len() - 1] != SYSEX_END {
        return false;
    }
    data[1..data.len() - 1]
        .iter()
        .all(|&b| b < 0x80 || b >= 0xF0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(device_id: u8, model_id: u8, command: u8, payload: &[u8]) -> Vec<u8> {
        build_event(device_id, model_id, command, payload)
    }

    #[test]
    fn test_build_then_parse_round_trip() {
        let payload = [0x01, 0x02, 0x03];
        let bytes = wrap(BROADCAST_DEVICE_ID, 0x20, 0x34, &payload);
        let events = parse_events(&bytes);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].device_id, BROADCAST_DEVICE_ID);
        assert_eq!(events[0].model_id, 0x20);
        assert_eq!(events[0].command, 0x34);
        assert_eq!(events[0].payload, payload);
    }

    #[test]
    fn test_skips_malformed_terminator() {
        let mut bytes = wrap(0x00, 0x20, 0x34, &[0x01]);
        let last = bytes.len() - 1;
        bytes[last] = 0xF1; // a status byte, but not the 0xF7 terminator
        let events = parse_events(&bytes);
        assert!(events.is_empty());
    }

    #[test]
    fn test_skips_wrong_vendor() {
        let mut bytes = wrap(0x00, 0x20, 0x34, &[0x01]);
        bytes[1] = 0x41; // corrupt the vendor tag
        let events = parse_events(&bytes);
        assert!(events.is_empty());
    }

    #[test]
    fn test_multiple_events_in_one_stream() {
        let mut bytes = wrap(0x00, 0x20, 0x34, &[0x01]);
        bytes.extend(wrap(0x00, 0x20, 0x34, &[0x02]));
        let events = parse_events(&bytes);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload, [0x01]);
        assert_eq!(events[1].payload, [0x02]);
    }

    #[test]
    fn test_garbage_before_first_event_is_ignored() {
        let mut bytes = vec![0x00, 0x01, 0x02];
        bytes.extend(wrap(0x00, 0x20, 0x34, &[0xAA]));
        let events = parse_events(&bytes);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_looks_like_sysex() {
        let bytes = wrap(0x00, 0x20, 0x34, &[0x01, 0x02]);
        assert!(looks_like_sysex(&bytes));

        let raw = vec![0u8; 4096];
        assert!(!looks_like_sysex(&raw));
    }

    #[test]
    fn test_looks_like_sysex_rejects_stray_high_bit() {
        let mut bytes = wrap(0x00, 0x20, 0x34, &[0x01]);
        // Corrupt an interior payload byte to have its MSB set without
        // being a genuine status byte terminator.
        let idx = bytes.len() - 2;
        bytes[idx] |= 0x80;
        assert!(!looks_like_sysex(&bytes));
    }
}
