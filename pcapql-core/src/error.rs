//! Error types for pcapql-core.
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`PcapError`] - Errors from capture segment reading
//! - [`ProtocolError`] - Errors from protocol decoding

use thiserror::Error;

/// Main error type for pcapql-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading or parsing a capture segment
    #[error("PCAP error: {0}")]
    Pcap(#[from] PcapError),

    /// Error during protocol parsing
    #[error("Protocol parse error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to capture segment reading.
#[derive(Error, Debug)]
pub enum PcapError {
    /// Segment file not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Invalid segment format
    #[error("Invalid PCAP format: {reason}")]
    InvalidFormat { reason: String },

    /// Truncated packet
    #[error("Truncated packet at offset {offset}: expected {expected} bytes, got {actual}")]
    TruncatedPacket {
        offset: u64,
        expected: usize,
        actual: usize,
    },
}

/// Errors related to protocol parsing.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Packet too short for protocol header
    #[error("{protocol}: packet too short (need {needed} bytes, have {have})")]
    PacketTooShort {
        protocol: &'static str,
        needed: usize,
        have: usize,
    },

    /// Invalid header field value
    #[error("{protocol}: invalid {field}: {reason}")]
    InvalidField {
        protocol: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(PcapError::TruncatedPacket {
            offset: 24,
            expected: 60,
            actual: 12,
        });
        assert_eq!(
            err.to_string(),
            "PCAP error: Truncated packet at offset 24: expected 60 bytes, got 12"
        );

        let err = ProtocolError::PacketTooShort {
            protocol: "dns",
            needed: 12,
            have: 4,
        };
        assert_eq!(err.to_string(), "dns: packet too short (need 12 bytes, have 4)");
    }
}
