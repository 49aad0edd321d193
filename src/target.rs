//! Message target interface between the decoders and the device model

use crate::core::{AltMode, FanMode, Mode, SwingMode};

/// Receiver for decoded frame contents and low-level link events
///
/// Implemented by the surrounding device-model layer in production and by
/// recording doubles in tests. The decoders call one method per decoded
/// field change per frame; calls are plain notifications and are neither
/// batched nor deduplicated.
pub trait MessageTarget {
    /// Current monotonic time in milliseconds
    fn get_milliseconds(&self) -> u32;

    /// Request transmission of a frame; `id` > 0 marks it as ack-eligible
    fn publish_data(&mut self, data: Vec<u8>, id: u8);

    /// A frame carrying this identifier was acknowledged by its peer
    fn ack_data(&mut self, id: u8);

    /// A frame from a not-necessarily-new device address was decoded
    fn register_address(&mut self, address: &str);

    /// Power state of the unit at `address`
    fn set_power(&mut self, address: &str, value: bool);

    /// Measured room temperature in degrees Celsius
    fn set_room_temperature(&mut self, address: &str, value: f32);

    /// Measured room humidity in percent
    fn set_room_humidity(&mut self, address: &str, value: f32);

    /// Configured target temperature in degrees Celsius
    fn set_target_temperature(&mut self, address: &str, value: f32);

    /// Operating mode
    fn set_mode(&mut self, address: &str, mode: Mode);

    /// Fan speed
    fn set_fanmode(&mut self, address: &str, fanmode: FanMode);

    /// Alternative comfort mode
    fn set_altmode(&mut self, address: &str, altmode: AltMode);

    /// Vertical louver swing state
    fn set_swing_vertical(&mut self, address: &str, value: bool);

    /// Horizontal louver swing state
    fn set_swing_horizontal(&mut self, address: &str, value: bool);
}

/// A sparse set of desired target-state fields for one device
///
/// Each present field is encoded independently by the protocol selected for
/// the destination address; absent fields are left unspecified on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtocolRequest {
    /// Desired power state
    pub power: Option<bool>,
    /// Desired operating mode
    pub mode: Option<Mode>,
    /// Desired target temperature in degrees Celsius
    pub target_temp: Option<f32>,
    /// Desired fan speed
    pub fan_mode: Option<FanMode>,
    /// Desired louver swing setting
    pub swing_mode: Option<SwingMode>,
    /// Desired alternative comfort mode
    pub alt_mode: Option<AltMode>,
}

impl ProtocolRequest {
    /// Create an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether no field is present
    pub fn is_empty(&self) -> bool {
        self.power.is_none()
            && self.mode.is_none()
            && self.target_temp.is_none()
            && self.fan_mode.is_none()
            && self.swing_mode.is_none()
            && self.alt_mode.is_none()
    }
}
