//! Dual-protocol dispatch and protocol selection by address shape

use crate::core::{is_nasa_address, DecodeOutcome, FrameStep};
use crate::error::Result;
use crate::target::{MessageTarget, ProtocolRequest};
use crate::{nasa, non_nasa};

/// Try to decode one frame from the front of the buffer
///
/// Designed to run after every append to the receive buffer. The legacy
/// (non-NASA) grammar is attempted first; if it yields a complete frame the
/// frame is delivered and the NASA decoder is not consulted. Otherwise the
/// NASA decoder runs and its result is authoritative for Fill vs Skip.
///
/// The priority is a convention, not a correctness requirement: the two
/// grammars carry independent integrity checks, so a byte sequence passing
/// both is not expected on a real bus.
pub fn process_data(data: &[u8], target: &mut dyn MessageTarget) -> DecodeOutcome {
    if let FrameStep::Complete { frame, consumed } = non_nasa::try_decode(data) {
        non_nasa::process(&frame, target);
        return DecodeOutcome::Processed(consumed);
    }

    match nasa::try_decode(data) {
        FrameStep::Complete { frame, consumed } => {
            nasa::process(&frame, target);
            DecodeOutcome::Processed(consumed)
        }
        step => step.outcome(),
    }
}

/// The wire format a device speaks, selected by its address shape
///
/// Replaces per-protocol singleton objects: both decoders are stateless, so
/// a plain variant selected by a pure function of the address is enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolKind {
    /// Legacy fixed-length wire format
    NonNasa,
    /// Block-oriented NASA wire format
    Nasa,
}

impl ProtocolKind {
    /// Select the protocol for a device address
    pub fn for_address(address: &str) -> Self {
        if is_nasa_address(address) {
            ProtocolKind::Nasa
        } else {
            ProtocolKind::NonNasa
        }
    }

    /// Encode a control request for `address` in this wire format
    ///
    /// Returns the frame bytes and the identifier to queue them under:
    /// `packet_number` for NASA (ack-eligible), 0 for the legacy format
    /// (fire-and-forget).
    pub fn encode_request(
        &self,
        address: &str,
        request: &ProtocolRequest,
        packet_number: u8,
    ) -> Result<(Vec<u8>, u8)> {
        match self {
            ProtocolKind::NonNasa => {
                let frame = non_nasa::encode_request(address, request)?;
                Ok((frame, 0))
            }
            ProtocolKind::Nasa => {
                let frame = nasa::encode_request(address, request, packet_number)?;
                Ok((frame, packet_number))
            }
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::NonNasa => write!(f, "non-NASA"),
            ProtocolKind::Nasa => write!(f, "NASA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::NON_NASA_FRAME_LEN;
    use crate::core::Mode;
    use crate::test_support::RecordingTarget;

    fn legacy_state_frame() -> Vec<u8> {
        non_nasa::Packet {
            src: 0x00,
            dst: 0xd0,
            command: non_nasa::CMD_STATE,
            payload: [77, 75, 0, 0x01, 0x00, 0, 0, 0],
        }
        .encode()
    }

    fn nasa_notification_frame() -> Vec<u8> {
        nasa::Packet {
            sa: nasa::Address {
                class: 0x20,
                channel: 0x00,
                address: 0x01,
            },
            da: nasa::Address::controller(),
            command: nasa::Command {
                data_type: nasa::DataType::Notification,
                packet_number: 0,
                ..nasa::Command::request(0)
            },
            messages: vec![nasa::Message {
                number: nasa::MSG_POWER,
                value: nasa::MessageValue::Enum(1),
            }],
        }
        .encode()
    }

    #[test]
    fn test_dispatch_legacy_frame() {
        let frame = legacy_state_frame();
        let mut target = RecordingTarget::default();

        let outcome = process_data(&frame, &mut target);
        assert_eq!(outcome, DecodeOutcome::Processed(NON_NASA_FRAME_LEN));
        assert_eq!(target.registered, vec!["00".to_string()]);
    }

    #[test]
    fn test_dispatch_nasa_frame() {
        let frame = nasa_notification_frame();
        let mut target = RecordingTarget::default();

        let outcome = process_data(&frame, &mut target);
        assert_eq!(outcome, DecodeOutcome::Processed(frame.len()));
        assert_eq!(target.registered, vec!["20.00.01".to_string()]);
    }

    #[test]
    fn test_dispatch_garbage_is_skip() {
        let mut target = RecordingTarget::default();
        let outcome = process_data(&[0xf9, 0xf6, 0xf1], &mut target);
        assert_eq!(outcome, DecodeOutcome::Skip);
        assert!(target.registered.is_empty());
    }

    #[test]
    fn test_dispatch_partial_nasa_frame_is_fill() {
        let frame = nasa_notification_frame();
        let mut target = RecordingTarget::default();
        let outcome = process_data(&frame[..5], &mut target);
        assert_eq!(outcome, DecodeOutcome::Fill);
    }

    #[test]
    fn test_protocol_selection() {
        assert_eq!(ProtocolKind::for_address("00"), ProtocolKind::NonNasa);
        assert_eq!(ProtocolKind::for_address("c8"), ProtocolKind::NonNasa);
        assert_eq!(ProtocolKind::for_address("20.00.01"), ProtocolKind::Nasa);
    }

    #[test]
    fn test_encode_request_identifier_rules() -> crate::Result<()> {
        let mut request = ProtocolRequest::new();
        request.mode = Some(Mode::Cool);

        let (_, id) = ProtocolKind::for_address("00").encode_request("00", &request, 9)?;
        assert_eq!(id, 0);

        let (_, id) =
            ProtocolKind::for_address("20.00.01").encode_request("20.00.01", &request, 9)?;
        assert_eq!(id, 9);
        Ok(())
    }
}
