//! # Samsung HVAC Bus Protocol
//!
//! A Rust library for decoding the proprietary Samsung HVAC serial bus
//! protocol and managing reliable delivery of outgoing command packets on
//! the same half-duplex link.
//!
//! Two mutually exclusive wire formats share the bus: the block-oriented
//! "NASA" format used by newer device families and a fixed-length legacy
//! ("non-NASA") format. Both begin frames with the same sentinel byte, so
//! the stream decoder tries the legacy format first and falls back to NASA.
//! This library provides:
//!
//! - Incremental frame decoding with resynchronization over noisy input
//! - Dual-protocol dispatch and device-address classification
//! - An outgoing packet queue with silence gating, retries and ack matching
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization support
//!
//! ## Example
//!
//! ```
//! use samsung_hvac_bus::{classify_address_type, AddressType};
//!
//! assert_eq!(classify_address_type("20.00.01"), AddressType::Indoor);
//! ```

pub mod core;
pub mod error;
pub mod link;
pub mod nasa;
pub mod non_nasa;
pub mod protocol;
pub mod queue;
pub mod stream;
pub mod target;

pub use crate::core::{classify_address_type, is_nasa_address, AddressType, DecodeOutcome};
pub use error::{ProtocolError, Result};
pub use link::{BusLink, ByteTransport, Clock};
pub use protocol::{process_data, ProtocolKind};
pub use queue::{DeliveryCallback, LinkConfig, OutgoingQueue};
pub use stream::StreamAssembler;
pub use target::{MessageTarget, ProtocolRequest};

/// Reserved protocol constants shared by both wire formats
pub mod bus {
    /// First byte of every frame on the bus
    pub const FRAME_START: u8 = 0x32;

    /// Last byte of every frame on the bus
    pub const FRAME_END: u8 = 0x34;

    /// Fixed length of a legacy (non-NASA) frame in bytes
    pub const NON_NASA_FRAME_LEN: usize = 14;

    /// Smallest value of the NASA size field (empty message area)
    pub const NASA_MIN_SIZE: usize = 13;

    /// Largest plausible value of the NASA size field; anything bigger is
    /// treated as corrupted length data
    pub const NASA_MAX_SIZE: usize = 1500;
}
