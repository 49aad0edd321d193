//! Error types for the Samsung HVAC bus protocol

use thiserror::Error;

/// Result type for Samsung HVAC bus operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Error types encountered while encoding requests or validating frames
///
/// Corrupted receive data is never reported through this type: the decoders
/// degrade to a `Skip` outcome and the stream resynchronizes. These errors
/// cover caller mistakes (bad address strings, out-of-range request fields)
/// and frame validation failures surfaced by the lower-level parse helpers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Device address string does not match the expected shape
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// A request field is outside the encodable range
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Frame checksum or CRC does not match its contents
    #[error("Checksum mismatch: {0}")]
    ChecksumMismatch(String),

    /// A message set extends past the end of the frame's message area
    #[error("Malformed message set: {0}")]
    MalformedMessageSet(String),

    /// Frame is structurally truncated
    #[error("Truncated frame: {0}")]
    TruncatedFrame(String),
}

impl ProtocolError {
    /// Create a new InvalidAddress error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        ProtocolError::InvalidAddress(msg.into())
    }

    /// Create a new InvalidRequest error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ProtocolError::InvalidRequest(msg.into())
    }

    /// Create a new ChecksumMismatch error
    pub fn checksum_mismatch(msg: impl Into<String>) -> Self {
        ProtocolError::ChecksumMismatch(msg.into())
    }

    /// Create a new MalformedMessageSet error
    pub fn malformed_message_set(msg: impl Into<String>) -> Self {
        ProtocolError::MalformedMessageSet(msg.into())
    }

    /// Create a new TruncatedFrame error
    pub fn truncated_frame(msg: impl Into<String>) -> Self {
        ProtocolError::TruncatedFrame(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::invalid_address("xyz");
        assert!(err.to_string().contains("Invalid address"));
    }
}
