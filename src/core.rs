//! Core types for the Samsung HVAC bus protocol

/// Result of one decode attempt against the front of the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecodeOutcome {
    /// No frame boundary is identifiable yet; wait for more bytes
    Fill,
    /// The buffer does not begin with a recognizable frame; bytes must be
    /// discarded up to the next plausible frame start
    Skip,
    /// Exactly this many bytes formed one valid frame that has already been
    /// delivered to the message target
    Processed(usize),
}

impl DecodeOutcome {
    /// Check whether this outcome consumed bytes
    pub fn is_processed(&self) -> bool {
        matches!(self, DecodeOutcome::Processed(_))
    }
}

impl std::fmt::Display for DecodeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeOutcome::Fill => write!(f, "Fill"),
            DecodeOutcome::Skip => write!(f, "Skip"),
            DecodeOutcome::Processed(n) => write!(f, "Processed({})", n),
        }
    }
}

/// Intermediate result of a single protocol's frame decoder
///
/// `Complete` carries the parsed frame so that event delivery can run as a
/// separate, stateless step. The dispatcher collapses this into a
/// [`DecodeOutcome`] after delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStep<T> {
    /// Not enough bytes to decide
    Fill,
    /// The buffer cannot start with a frame of this protocol
    Skip,
    /// One full frame parsed; `consumed` bytes belong to it
    Complete { frame: T, consumed: usize },
}

impl<T> FrameStep<T> {
    /// Collapse to the outcome reported to the stream assembler
    pub fn outcome(&self) -> DecodeOutcome {
        match self {
            FrameStep::Fill => DecodeOutcome::Fill,
            FrameStep::Skip => DecodeOutcome::Skip,
            FrameStep::Complete { consumed, .. } => DecodeOutcome::Processed(*consumed),
        }
    }
}

/// Role of a device address on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressType {
    /// Outdoor unit
    Outdoor,
    /// Indoor unit
    Indoor,
    /// Anything else (wired remotes, other controllers)
    Other,
}

impl std::fmt::Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressType::Outdoor => write!(f, "Outdoor"),
            AddressType::Indoor => write!(f, "Indoor"),
            AddressType::Other => write!(f, "Other"),
        }
    }
}

/// Classify a device address into outdoor, indoor or other
///
/// `"c8"` is the non-NASA outdoor unit; NASA outdoor units live in the
/// `10.` address class. `"00"`..`"03"` are non-NASA indoor units; NASA
/// indoor units live in the `20.` address class.
pub fn classify_address_type(address: &str) -> AddressType {
    if address == "c8" || address.starts_with("10.") {
        return AddressType::Outdoor;
    }

    if address == "00"
        || address == "01"
        || address == "02"
        || address == "03"
        || address.starts_with("20.")
    {
        return AddressType::Indoor;
    }

    AddressType::Other
}

/// Check whether an address belongs to the NASA protocol
///
/// The non-NASA protocol addresses devices with exactly two hex characters;
/// every other address shape belongs to the NASA protocol.
pub fn is_nasa_address(address: &str) -> bool {
    address.len() != 2
}

/// Operating mode of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Value on the wire was not a known mode
    Unknown,
    Auto,
    Cool,
    Dry,
    Fan,
    Heat,
}

impl Mode {
    /// Decode from the raw wire value
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => Mode::Auto,
            1 => Mode::Cool,
            2 => Mode::Dry,
            3 => Mode::Fan,
            4 => Mode::Heat,
            _ => Mode::Unknown,
        }
    }

    /// Encode to the raw wire value (`Unknown` encodes as auto)
    pub fn encoded(&self) -> u8 {
        match self {
            Mode::Unknown | Mode::Auto => 0,
            Mode::Cool => 1,
            Mode::Dry => 2,
            Mode::Fan => 3,
            Mode::Heat => 4,
        }
    }
}

/// Fan speed of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FanMode {
    /// Value on the wire was not a known fan mode
    Unknown,
    Auto,
    Low,
    Mid,
    High,
    Turbo,
    Off,
}

impl FanMode {
    /// Decode from the raw wire value
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => FanMode::Auto,
            1 => FanMode::Low,
            2 => FanMode::Mid,
            3 => FanMode::High,
            4 => FanMode::Turbo,
            5 => FanMode::Off,
            _ => FanMode::Unknown,
        }
    }

    /// Encode to the raw wire value (`Unknown` encodes as auto)
    pub fn encoded(&self) -> u8 {
        match self {
            FanMode::Unknown | FanMode::Auto => 0,
            FanMode::Low => 1,
            FanMode::Mid => 2,
            FanMode::High => 3,
            FanMode::Turbo => 4,
            FanMode::Off => 5,
        }
    }
}

/// Alternative comfort mode of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AltMode {
    /// Value on the wire was not a known alt mode
    Unknown,
    None,
    Sleep,
    Quiet,
    Fast,
    LongReach,
    Windfree,
}

impl AltMode {
    /// Decode from the raw wire value
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => AltMode::None,
            1 => AltMode::Sleep,
            2 => AltMode::Quiet,
            3 => AltMode::Fast,
            4 => AltMode::LongReach,
            5 => AltMode::Windfree,
            _ => AltMode::Unknown,
        }
    }

    /// Encode to the raw wire value (`Unknown` encodes as none)
    pub fn encoded(&self) -> u8 {
        match self {
            AltMode::Unknown | AltMode::None => 0,
            AltMode::Sleep => 1,
            AltMode::Quiet => 2,
            AltMode::Fast => 3,
            AltMode::LongReach => 4,
            AltMode::Windfree => 5,
        }
    }
}

/// Louver swing setting of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SwingMode {
    Fix,
    Vertical,
    Horizontal,
    All,
}

impl SwingMode {
    /// Encode to the raw wire value
    pub fn encoded(&self) -> u8 {
        match self {
            SwingMode::Fix => 0,
            SwingMode::Vertical => 1,
            SwingMode::Horizontal => 2,
            SwingMode::All => 3,
        }
    }

    /// Whether the vertical louver sweeps in this setting
    pub fn vertical(&self) -> bool {
        matches!(self, SwingMode::Vertical | SwingMode::All)
    }

    /// Whether the horizontal louver sweeps in this setting
    pub fn horizontal(&self) -> bool {
        matches!(self, SwingMode::Horizontal | SwingMode::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_type_classification() {
        assert_eq!(classify_address_type("c8"), AddressType::Outdoor);
        assert_eq!(classify_address_type("10.00.00"), AddressType::Outdoor);
        assert_eq!(classify_address_type("00"), AddressType::Indoor);
        assert_eq!(classify_address_type("03"), AddressType::Indoor);
        assert_eq!(classify_address_type("20.5"), AddressType::Indoor);
        assert_eq!(classify_address_type("20.00.01"), AddressType::Indoor);
        assert_eq!(classify_address_type("ff"), AddressType::Other);
        assert_eq!(classify_address_type("80.ff.00"), AddressType::Other);
    }

    #[test]
    fn test_nasa_address_detection() {
        assert!(!is_nasa_address("00"));
        assert!(!is_nasa_address("c8"));
        assert!(is_nasa_address("200005ff"));
        assert!(is_nasa_address("20.00.01"));
        assert!(is_nasa_address(""));
    }

    #[test]
    fn test_mode_raw_roundtrip() {
        for raw in 0..=4u8 {
            assert_eq!(Mode::from_raw(raw).encoded(), raw);
        }
        assert_eq!(Mode::from_raw(99), Mode::Unknown);
    }

    #[test]
    fn test_fan_mode_raw_roundtrip() {
        for raw in 0..=5u8 {
            assert_eq!(FanMode::from_raw(raw).encoded(), raw);
        }
        assert_eq!(FanMode::from_raw(42), FanMode::Unknown);
    }

    #[test]
    fn test_swing_mode_axes() {
        assert!(!SwingMode::Fix.vertical());
        assert!(SwingMode::Vertical.vertical());
        assert!(!SwingMode::Vertical.horizontal());
        assert!(SwingMode::All.vertical());
        assert!(SwingMode::All.horizontal());
    }

    #[test]
    fn test_frame_step_outcome() {
        assert_eq!(FrameStep::<()>::Fill.outcome(), DecodeOutcome::Fill);
        assert_eq!(FrameStep::<()>::Skip.outcome(), DecodeOutcome::Skip);
        let step = FrameStep::Complete {
            frame: (),
            consumed: 14,
        };
        assert_eq!(step.outcome(), DecodeOutcome::Processed(14));
    }

    #[test]
    fn test_decode_outcome_display() {
        assert_eq!(DecodeOutcome::Fill.to_string(), "Fill");
        assert_eq!(DecodeOutcome::Processed(5).to_string(), "Processed(5)");
    }
}
