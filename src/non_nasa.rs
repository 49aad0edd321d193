//! Legacy (non-NASA) frame grammar: fixed-length 14-byte frames
//!
//! Frame layout:
//!
//! ```text
//! [0]     0x32 start
//! [1]     source address
//! [2]     destination address
//! [3]     command
//! [4..12] payload (8 bytes)
//! [12]    checksum (XOR of bytes 1..=11)
//! [13]    0x34 end
//! ```

use crate::bus::{FRAME_END, FRAME_START, NON_NASA_FRAME_LEN};
use crate::core::{FanMode, FrameStep, Mode};
use crate::error::{ProtocolError, Result};
use crate::target::{MessageTarget, ProtocolRequest};

/// Periodic indoor unit state broadcast
pub const CMD_STATE: u8 = 0x20;

/// Control request sent by a wired remote
pub const CMD_CONTROL: u8 = 0xb0;

/// Source address used when this library acts as a wired remote
pub const CONTROLLER_ADDRESS: u8 = 0xd0;

/// Offset applied to temperatures on the wire
const TEMPERATURE_OFFSET: u8 = 55;

/// A parsed legacy frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    /// Source device address
    pub src: u8,
    /// Destination device address
    pub dst: u8,
    /// Command byte
    pub command: u8,
    /// Raw payload bytes
    pub payload: [u8; 8],
}

impl Packet {
    /// Source address as the 2-hex-char string used across the library
    pub fn source_address(&self) -> String {
        format!("{:02x}", self.src)
    }

    /// Destination address as the 2-hex-char string used across the library
    pub fn destination_address(&self) -> String {
        format!("{:02x}", self.dst)
    }

    /// Serialize into a complete wire frame, checksum included
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(NON_NASA_FRAME_LEN);
        frame.push(FRAME_START);
        frame.push(self.src);
        frame.push(self.dst);
        frame.push(self.command);
        frame.extend_from_slice(&self.payload);
        frame.push(checksum(&frame));
        frame.push(FRAME_END);
        frame
    }
}

/// XOR checksum over bytes 1..=11 of a frame
fn checksum(frame: &[u8]) -> u8 {
    frame[1..12].iter().fold(0, |acc, &b| acc ^ b)
}

/// Attempt to decode one legacy frame from the front of the buffer
pub fn try_decode(data: &[u8]) -> FrameStep<Packet> {
    if data.is_empty() {
        return FrameStep::Fill;
    }
    if data[0] != FRAME_START {
        return FrameStep::Skip;
    }
    if data.len() < NON_NASA_FRAME_LEN {
        return FrameStep::Fill;
    }
    if data[13] != FRAME_END {
        return FrameStep::Skip;
    }
    if checksum(data) != data[12] {
        log::debug!(
            "non-nasa checksum mismatch: computed {:02x}, frame carries {:02x}",
            checksum(data),
            data[12]
        );
        return FrameStep::Skip;
    }

    let mut payload = [0u8; 8];
    payload.copy_from_slice(&data[4..12]);

    FrameStep::Complete {
        frame: Packet {
            src: data[1],
            dst: data[2],
            command: data[3],
            payload,
        },
        consumed: NON_NASA_FRAME_LEN,
    }
}

/// Deliver the decoded contents of a legacy frame to the message target
pub fn process(packet: &Packet, target: &mut dyn MessageTarget) {
    let address = packet.source_address();
    target.register_address(&address);

    if packet.command != CMD_STATE {
        log::debug!(
            "non-nasa command {:02x} from {} ignored",
            packet.command,
            address
        );
        return;
    }

    let p = &packet.payload;
    target.set_power(&address, p[3] & 0x80 != 0);
    target.set_mode(&address, Mode::from_raw(p[3] & 0x0f));
    target.set_fanmode(&address, FanMode::from_raw(p[4] & 0x07));
    target.set_target_temperature(&address, f32::from(p[0]) - f32::from(TEMPERATURE_OFFSET));
    target.set_room_temperature(&address, f32::from(p[1]) - f32::from(TEMPERATURE_OFFSET));
    target.set_swing_vertical(&address, p[4] & 0x10 != 0);
    target.set_swing_horizontal(&address, p[4] & 0x20 != 0);
}

/// Encode a control request for a legacy-addressed device
///
/// Absent request fields encode as zero, which the units treat as
/// auto/off; the legacy wire format has no way to leave a field out of a
/// control frame. Legacy frames carry no acknowledgment, so the returned
/// identifier is always 0 (fire-and-forget).
pub fn encode_request(address: &str, request: &ProtocolRequest) -> Result<Vec<u8>> {
    let dst = parse_address(address)?;

    let mut payload = [0u8; 8];

    if let Some(temp) = request.target_temp {
        if !(16.0..=30.0).contains(&temp) {
            return Err(ProtocolError::invalid_request(format!(
                "Target temperature {} out of range [16, 30]",
                temp
            )));
        }
        payload[0] = temp as u8 + TEMPERATURE_OFFSET;
    }

    let mode = request.mode.unwrap_or(Mode::Auto);
    payload[3] = mode.encoded() & 0x0f;
    if request.power.unwrap_or(false) {
        payload[3] |= 0x80;
    }

    let fan = request.fan_mode.unwrap_or(FanMode::Auto);
    payload[4] = fan.encoded() & 0x07;
    if let Some(swing) = request.swing_mode {
        if swing.vertical() {
            payload[4] |= 0x10;
        }
        if swing.horizontal() {
            payload[4] |= 0x20;
        }
    }

    let packet = Packet {
        src: CONTROLLER_ADDRESS,
        dst,
        command: CMD_CONTROL,
        payload,
    };
    Ok(packet.encode())
}

/// Parse a 2-hex-char legacy address string into its wire byte
fn parse_address(address: &str) -> Result<u8> {
    if address.len() != 2 {
        return Err(ProtocolError::invalid_address(format!(
            "Legacy address must be 2 hex chars, got {:?}",
            address
        )));
    }
    u8::from_str_radix(address, 16).map_err(|_| {
        ProtocolError::invalid_address(format!("Legacy address is not hex: {:?}", address))
    })
}
