//! NASA frame grammar: variable-length, CRC-protected frames
//!
//! Frame layout:
//!
//! ```text
//! [0]            0x32 start
//! [1..3]         size, big-endian; total frame length is size + 2
//! [3..6]         source address (class, channel, address)
//! [6..9]         destination address
//! [9..12]        command header
//! [12..size-1]   message sets
//! [size-1..size+1] CRC16/XMODEM over bytes 3..size-1, big-endian
//! [size+1]       0x34 end
//! ```
//!
//! Each message set starts with a big-endian message number whose bits
//! 9..10 select the payload width: enum (1 byte), variable (2 bytes),
//! long variable (4 bytes) or structure (remainder of the message area).

use crate::bus::{FRAME_END, FRAME_START, NASA_MAX_SIZE, NASA_MIN_SIZE};
use crate::core::{AltMode, FanMode, FrameStep, Mode};
use crate::error::{ProtocolError, Result};
use crate::target::{MessageTarget, ProtocolRequest};

/// Power on/off (enum)
pub const MSG_POWER: u16 = 0x4000;
/// Operating mode (enum)
pub const MSG_MODE: u16 = 0x4001;
/// Fan speed (enum)
pub const MSG_FAN_MODE: u16 = 0x4006;
/// Louver swing setting (enum)
pub const MSG_SWING: u16 = 0x4011;
/// Horizontal-only louver swing (enum)
pub const MSG_SWING_HORIZONTAL: u16 = 0x407e;
/// Alternative comfort mode (enum)
pub const MSG_ALT_MODE: u16 = 0x4060;
/// Target temperature, tenths of a degree (variable)
pub const MSG_TARGET_TEMP: u16 = 0x4201;
/// Room temperature, tenths of a degree (variable)
pub const MSG_ROOM_TEMP: u16 = 0x4203;
/// Room humidity, percent (variable)
pub const MSG_HUMIDITY: u16 = 0x4238;

/// A three-part NASA device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Device class (0x10 outdoor, 0x20 indoor, 0x50 remotes, ...)
    pub class: u8,
    /// Channel within the class
    pub channel: u8,
    /// Device number on the channel
    pub address: u8,
}

impl Address {
    /// Address this library uses as the source of its own requests
    pub fn controller() -> Self {
        Address {
            class: 0x80,
            channel: 0xff,
            address: 0x00,
        }
    }

    /// Parse from the `"xx.xx.xx"` string shape
    pub fn parse(address: &str) -> Result<Self> {
        let parts: Vec<&str> = address.split('.').collect();
        if parts.len() != 3 {
            return Err(ProtocolError::invalid_address(format!(
                "NASA address must be three dot-separated hex bytes, got {:?}",
                address
            )));
        }
        let mut bytes = [0u8; 3];
        for (slot, part) in bytes.iter_mut().zip(parts.iter().copied()) {
            *slot = u8::from_str_radix(part, 16).map_err(|_| {
                ProtocolError::invalid_address(format!("NASA address is not hex: {:?}", address))
            })?;
        }
        Ok(Address {
            class: bytes[0],
            channel: bytes[1],
            address: bytes[2],
        })
    }

    fn decode(data: &[u8]) -> Self {
        Address {
            class: data[0],
            channel: data[1],
            address: data[2],
        }
    }

    fn encode_into(&self, frame: &mut Vec<u8>) {
        frame.push(self.class);
        frame.push(self.channel);
        frame.push(self.address);
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}.{:02x}.{:02x}", self.class, self.channel, self.address)
    }
}

/// Payload class of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketType {
    StandBy,
    Normal,
    Gathering,
    Install,
    Download,
    /// Value on the wire was not a known packet type
    Unknown,
}

impl PacketType {
    /// Decode from the raw wire value
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => PacketType::StandBy,
            1 => PacketType::Normal,
            2 => PacketType::Gathering,
            3 => PacketType::Install,
            4 => PacketType::Download,
            _ => PacketType::Unknown,
        }
    }

    /// Encode to the raw wire value
    pub fn encoded(&self) -> u8 {
        match self {
            PacketType::StandBy => 0,
            PacketType::Normal | PacketType::Unknown => 1,
            PacketType::Gathering => 2,
            PacketType::Install => 3,
            PacketType::Download => 4,
        }
    }
}

/// Transfer semantics of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    Undefined,
    Read,
    Write,
    Request,
    Notification,
    Response,
    Ack,
    Nack,
    /// Value on the wire was not a known data type
    Unknown,
}

impl DataType {
    /// Decode from the raw wire value
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => DataType::Undefined,
            1 => DataType::Read,
            2 => DataType::Write,
            3 => DataType::Request,
            4 => DataType::Notification,
            5 => DataType::Response,
            6 => DataType::Ack,
            7 => DataType::Nack,
            _ => DataType::Unknown,
        }
    }

    /// Encode to the raw wire value
    pub fn encoded(&self) -> u8 {
        match self {
            DataType::Undefined | DataType::Unknown => 0,
            DataType::Read => 1,
            DataType::Write => 2,
            DataType::Request => 3,
            DataType::Notification => 4,
            DataType::Response => 5,
            DataType::Ack => 6,
            DataType::Nack => 7,
        }
    }
}

/// The three-byte command header of a NASA frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    /// Information flag (bit 7 of the first header byte)
    pub packet_info: bool,
    /// Protocol version (2 on every observed bus)
    pub protocol_version: u8,
    /// Sender-side retry counter
    pub retry_count: u8,
    /// Payload class
    pub packet_type: PacketType,
    /// Transfer semantics
    pub data_type: DataType,
    /// Identifier matched by acks; 0 means unnumbered
    pub packet_number: u8,
}

impl Command {
    /// Header used for requests originated by this library
    pub fn request(packet_number: u8) -> Self {
        Command {
            packet_info: true,
            protocol_version: 2,
            retry_count: 0,
            packet_type: PacketType::Normal,
            data_type: DataType::Request,
            packet_number,
        }
    }

    fn decode(data: &[u8]) -> Self {
        Command {
            packet_info: data[0] & 0x80 != 0,
            protocol_version: (data[0] & 0x60) >> 5,
            retry_count: (data[0] & 0x18) >> 3,
            packet_type: PacketType::from_raw((data[1] & 0xf0) >> 4),
            data_type: DataType::from_raw(data[1] & 0x0f),
            packet_number: data[2],
        }
    }

    fn encode_into(&self, frame: &mut Vec<u8>) {
        let mut first = (self.protocol_version & 0x03) << 5 | (self.retry_count & 0x03) << 3;
        if self.packet_info {
            first |= 0x80;
        }
        frame.push(first);
        frame.push(self.packet_type.encoded() << 4 | self.data_type.encoded());
        frame.push(self.packet_number);
    }
}

/// Payload of one message set, width selected by the message number
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageValue {
    /// One-byte enumeration value
    Enum(u8),
    /// Two-byte big-endian value
    Variable(u16),
    /// Four-byte big-endian value
    LongVariable(u32),
    /// Free-form bytes; only legal as the sole message of a frame
    Structure(Vec<u8>),
}

/// One decoded message set
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// Message number
    pub number: u16,
    /// Decoded payload
    pub value: MessageValue,
}

impl Message {
    /// Width class of a message number: 0 enum, 1 variable, 2 long, 3 structure
    fn kind(number: u16) -> u16 {
        (number & 0x0600) >> 9
    }

    fn encode_into(&self, frame: &mut Vec<u8>) {
        frame.extend_from_slice(&self.number.to_be_bytes());
        match &self.value {
            MessageValue::Enum(v) => frame.push(*v),
            MessageValue::Variable(v) => frame.extend_from_slice(&v.to_be_bytes()),
            MessageValue::LongVariable(v) => frame.extend_from_slice(&v.to_be_bytes()),
            MessageValue::Structure(bytes) => frame.extend_from_slice(bytes),
        }
    }
}

/// A parsed NASA frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    /// Source device
    pub sa: Address,
    /// Destination device
    pub da: Address,
    /// Command header
    pub command: Command,
    /// Message sets in wire order
    pub messages: Vec<Message>,
}

impl Packet {
    /// Serialize into a complete wire frame, CRC included
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![FRAME_START, 0, 0];
        self.sa.encode_into(&mut frame);
        self.da.encode_into(&mut frame);
        self.command.encode_into(&mut frame);
        for message in &self.messages {
            message.encode_into(&mut frame);
        }

        // size counts every byte after the start sentinel plus the CRC
        let size = (frame.len() - 1 + 2) as u16;
        frame[1..3].copy_from_slice(&size.to_be_bytes());

        let crc = crc16(&frame[3..]);
        frame.extend_from_slice(&crc.to_be_bytes());
        frame.push(FRAME_END);
        frame
    }
}

/// CRC16/XMODEM (poly 0x1021, init 0) as used by the NASA protocol
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = crc << 1 ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Attempt to decode one NASA frame from the front of the buffer
pub fn try_decode(data: &[u8]) -> FrameStep<Packet> {
    if data.is_empty() {
        return FrameStep::Fill;
    }
    if data[0] != FRAME_START {
        return FrameStep::Skip;
    }
    if data.len() < 3 {
        return FrameStep::Fill;
    }

    let size = usize::from(u16::from_be_bytes([data[1], data[2]]));
    if !(NASA_MIN_SIZE..=NASA_MAX_SIZE).contains(&size) {
        log::debug!("nasa size field {} out of bounds", size);
        return FrameStep::Skip;
    }
    if data.len() < size + 2 {
        return FrameStep::Fill;
    }
    if data[size + 1] != FRAME_END {
        return FrameStep::Skip;
    }

    let crc_actual = crc16(&data[3..size - 1]);
    let crc_expected = u16::from_be_bytes([data[size - 1], data[size]]);
    if crc_actual != crc_expected {
        log::debug!(
            "nasa crc mismatch: computed {:04x}, frame carries {:04x}",
            crc_actual,
            crc_expected
        );
        return FrameStep::Skip;
    }

    match parse(data, size) {
        Ok(packet) => FrameStep::Complete {
            frame: packet,
            consumed: size + 2,
        },
        Err(err) => {
            log::debug!("nasa frame rejected: {}", err);
            FrameStep::Skip
        }
    }
}

/// Parse a structurally validated frame into a [`Packet`]
fn parse(data: &[u8], size: usize) -> Result<Packet> {
    let sa = Address::decode(&data[3..6]);
    let da = Address::decode(&data[6..9]);
    let command = Command::decode(&data[9..12]);

    let mut messages = Vec::new();
    let end = size - 1;
    let mut i = 12;
    while i < end {
        if i + 2 > end {
            return Err(ProtocolError::malformed_message_set(format!(
                "dangling byte at offset {}",
                i
            )));
        }
        let number = u16::from_be_bytes([data[i], data[i + 1]]);
        i += 2;

        let value = match Message::kind(number) {
            0 => {
                if i + 1 > end {
                    return Err(truncated_payload(number));
                }
                let v = MessageValue::Enum(data[i]);
                i += 1;
                v
            }
            1 => {
                if i + 2 > end {
                    return Err(truncated_payload(number));
                }
                let v = MessageValue::Variable(u16::from_be_bytes([data[i], data[i + 1]]));
                i += 2;
                v
            }
            2 => {
                if i + 4 > end {
                    return Err(truncated_payload(number));
                }
                let v = MessageValue::LongVariable(u32::from_be_bytes([
                    data[i],
                    data[i + 1],
                    data[i + 2],
                    data[i + 3],
                ]));
                i += 4;
                v
            }
            _ => {
                let v = MessageValue::Structure(data[i..end].to_vec());
                i = end;
                v
            }
        };

        messages.push(Message { number, value });
    }

    Ok(Packet {
        sa,
        da,
        command,
        messages,
    })
}

fn truncated_payload(number: u16) -> ProtocolError {
    ProtocolError::malformed_message_set(format!(
        "payload of message {:04x} overruns the frame",
        number
    ))
}

/// Deliver the decoded contents of a NASA frame to the message target
pub fn process(packet: &Packet, target: &mut dyn MessageTarget) {
    let source = packet.sa.to_string();
    target.register_address(&source);

    match packet.command.data_type {
        DataType::Ack => {
            target.ack_data(packet.command.packet_number);
            return;
        }
        DataType::Nack => {
            log::warn!(
                "nasa nack from {} for packet {}",
                source,
                packet.command.packet_number
            );
            return;
        }
        _ => {}
    }

    for message in &packet.messages {
        apply_message(message, &source, target);
    }
}

fn apply_message(message: &Message, source: &str, target: &mut dyn MessageTarget) {
    match (message.number, &message.value) {
        (MSG_POWER, MessageValue::Enum(v)) => target.set_power(source, *v != 0),
        (MSG_MODE, MessageValue::Enum(v)) => target.set_mode(source, Mode::from_raw(*v)),
        (MSG_FAN_MODE, MessageValue::Enum(v)) => {
            target.set_fanmode(source, FanMode::from_raw(*v))
        }
        (MSG_SWING, MessageValue::Enum(v)) => {
            target.set_swing_vertical(source, *v == 1 || *v == 3);
            target.set_swing_horizontal(source, *v == 2 || *v == 3);
        }
        (MSG_SWING_HORIZONTAL, MessageValue::Enum(v)) => {
            target.set_swing_horizontal(source, *v == 1)
        }
        (MSG_ALT_MODE, MessageValue::Enum(v)) => {
            target.set_altmode(source, AltMode::from_raw(*v))
        }
        (MSG_TARGET_TEMP, MessageValue::Variable(v)) => {
            target.set_target_temperature(source, f32::from(*v as i16) / 10.0)
        }
        (MSG_ROOM_TEMP, MessageValue::Variable(v)) => {
            target.set_room_temperature(source, f32::from(*v as i16) / 10.0)
        }
        (MSG_HUMIDITY, MessageValue::Variable(v)) => {
            target.set_room_humidity(source, f32::from(*v as i16))
        }
        _ => {
            log::trace!("nasa message {:04x} from {} ignored", message.number, source);
        }
    }
}

/// Encode a control request for a NASA-addressed device
///
/// `packet_number` becomes both the header identifier and the queue
/// identifier the peer's ack is matched against; callers must pass a
/// non-zero value for ack-eligible delivery.
pub fn encode_request(
    address: &str,
    request: &ProtocolRequest,
    packet_number: u8,
) -> Result<Vec<u8>> {
    if request.is_empty() {
        return Err(ProtocolError::invalid_request(
            "Request carries no fields".to_string(),
        ));
    }

    let da = Address::parse(address)?;
    let mut messages = Vec::new();

    if let Some(power) = request.power {
        messages.push(Message {
            number: MSG_POWER,
            value: MessageValue::Enum(u8::from(power)),
        });
    }
    if let Some(mode) = request.mode {
        messages.push(Message {
            number: MSG_MODE,
            value: MessageValue::Enum(mode.encoded()),
        });
    }
    if let Some(temp) = request.target_temp {
        if !(16.0..=30.0).contains(&temp) {
            return Err(ProtocolError::invalid_request(format!(
                "Target temperature {} out of range [16, 30]",
                temp
            )));
        }
        messages.push(Message {
            number: MSG_TARGET_TEMP,
            value: MessageValue::Variable((temp * 10.0) as u16),
        });
    }
    if let Some(fan) = request.fan_mode {
        messages.push(Message {
            number: MSG_FAN_MODE,
            value: MessageValue::Enum(fan.encoded()),
        });
    }
    if let Some(swing) = request.swing_mode {
        messages.push(Message {
            number: MSG_SWING,
            value: MessageValue::Enum(swing.encoded()),
        });
    }
    if let Some(alt) = request.alt_mode {
        messages.push(Message {
            number: MSG_ALT_MODE,
            value: MessageValue::Enum(alt.encoded()),
        });
    }

    let packet = Packet {
        sa: Address::controller(),
        da,
        command: Command::request(packet_number),
        messages,
    };
    Ok(packet.encode())
}
