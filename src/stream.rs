//! Receive-buffer ownership, incremental decoding and resynchronization

use crate::bus::FRAME_START;
use crate::core::DecodeOutcome;
use crate::protocol::process_data;
use crate::target::MessageTarget;

/// Render a byte span the way bus captures are usually read
pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Number of bytes to discard after an unrecognizable buffer front
///
/// Scans forward from offset 1 (offset 0 already failed to decode) for the
/// next frame-start sentinel. Both wire formats open with the same sentinel,
/// so the scan is protocol agnostic. If no sentinel follows, the whole
/// buffer is garbage.
pub(crate) fn resync_skip(data: &[u8]) -> usize {
    match data.iter().skip(1).position(|&b| b == FRAME_START) {
        Some(offset) => offset + 1,
        None => data.len(),
    }
}

/// Owner of the not-yet-consumed receive bytes
///
/// Bytes are appended as they arrive and consumed strictly from the front:
/// a decode attempt runs after every append, and `Processed`/`Skip`
/// outcomes truncate the consumed or discarded prefix. A `Fill` outcome
/// leaves the buffer untouched, so repeated attempts on a stalled buffer
/// are idempotent.
#[derive(Default)]
pub struct StreamAssembler {
    data: Vec<u8>,
}

impl StreamAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        StreamAssembler { data: Vec::new() }
    }

    /// Append one received byte
    pub fn push_byte(&mut self, byte: u8) {
        self.data.push(byte);
    }

    /// Append a batch of received bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Check whether any bytes are pending
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of pending bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// The pending bytes, front first
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Run one decode attempt against the buffer front
    ///
    /// `elapsed_ms` is the time since the last bus activity and only feeds
    /// the byte-dump logging. Returns the outcome after applying it to the
    /// buffer; the caller records bus activity for every non-`Fill` result.
    pub fn advance(&mut self, target: &mut dyn MessageTarget, elapsed_ms: u32) -> DecodeOutcome {
        if self.data.is_empty() {
            return DecodeOutcome::Fill;
        }

        let outcome = process_data(&self.data, target);
        match outcome {
            DecodeOutcome::Fill => {}
            DecodeOutcome::Processed(consumed) => {
                log::debug!(">> [+{}ms] {}", elapsed_ms, hex(&self.data[..consumed]));
                self.data.drain(..consumed);
            }
            DecodeOutcome::Skip => {
                let discarded = resync_skip(&self.data);
                log::debug!(
                    ">> [+{}ms] {} (discarded as noise)",
                    elapsed_ms,
                    hex(&self.data[..discarded])
                );
                self.data.drain(..discarded);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::non_nasa;
    use crate::test_support::RecordingTarget;

    fn legacy_frame() -> Vec<u8> {
        non_nasa::Packet {
            src: 0x00,
            dst: 0xd0,
            command: non_nasa::CMD_STATE,
            payload: [77, 75, 0, 0x81, 0x00, 0, 0, 0],
        }
        .encode()
    }

    #[test]
    fn test_fill_is_idempotent() {
        let mut assembler = StreamAssembler::new();
        let frame = legacy_frame();
        assembler.extend(&frame[..6]);

        let mut target = RecordingTarget::default();
        for _ in 0..5 {
            assert_eq!(assembler.advance(&mut target, 0), DecodeOutcome::Fill);
            assert_eq!(assembler.as_slice(), &frame[..6]);
        }
    }

    #[test]
    fn test_consumption_exactness() {
        let mut assembler = StreamAssembler::new();
        let frame = legacy_frame();
        let tail = [0x32, 0x00];
        assembler.extend(&frame);
        assembler.extend(&tail);

        let mut target = RecordingTarget::default();
        assert_eq!(
            assembler.advance(&mut target, 0),
            DecodeOutcome::Processed(frame.len())
        );
        assert_eq!(assembler.as_slice(), &tail);
    }

    #[test]
    fn test_processing_whole_buffer_empties_it() {
        let mut assembler = StreamAssembler::new();
        assembler.extend(&legacy_frame());

        let mut target = RecordingTarget::default();
        assert!(assembler.advance(&mut target, 0).is_processed());
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_resync_skip_bounds() {
        // Marker at offset 3: discard exactly 3 bytes
        assert_eq!(resync_skip(&[0xff, 0x01, 0x02, 0x32, 0x55]), 3);
        // Marker at offset 0 never counts; the next one wins
        assert_eq!(resync_skip(&[0x32, 0x00, 0x32]), 2);
        // No marker: the whole buffer goes
        assert_eq!(resync_skip(&[0xff, 0xfe, 0xfd]), 3);
        // Single unrecognizable byte
        assert_eq!(resync_skip(&[0xff]), 1);
    }

    #[test]
    fn test_garbage_then_frame() {
        let mut assembler = StreamAssembler::new();
        let frame = legacy_frame();
        assembler.extend(&[0xf9, 0xf6, 0xf1, 0xf9, 0xf9]);
        assembler.extend(&frame);

        let mut target = RecordingTarget::default();
        assert_eq!(assembler.advance(&mut target, 0), DecodeOutcome::Skip);
        assert_eq!(assembler.as_slice(), frame.as_slice());
        assert_eq!(
            assembler.advance(&mut target, 0),
            DecodeOutcome::Processed(frame.len())
        );
        assert!(assembler.is_empty());
        assert_eq!(target.registered, vec!["00".to_string()]);
    }

    #[test]
    fn test_pure_garbage_is_discarded_entirely() {
        let mut assembler = StreamAssembler::new();
        assembler.extend(&[0xf9, 0xf6, 0xf1]);

        let mut target = RecordingTarget::default();
        assert_eq!(assembler.advance(&mut target, 0), DecodeOutcome::Skip);
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_advance_on_empty_buffer_is_fill() {
        let mut assembler = StreamAssembler::new();
        let mut target = RecordingTarget::default();
        assert_eq!(assembler.advance(&mut target, 0), DecodeOutcome::Fill);
    }
}
