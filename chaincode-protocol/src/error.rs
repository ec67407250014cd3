//! Error types for the shared chaincode record protocol.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use err_derive::Error;

/// Errors raised when encoding, decoding, or transporting protocol messages
/// and records.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An I/O error was raised while reading from or writing to a socket.
    #[error(display = "ProtocolError: I/O error: {}.", _0)]
    IOError(#[error(source)] std::io::Error),
    /// Serialization or deserialization of a duplex message failed.
    #[error(display = "ProtocolError: bincode error: {}.", _0)]
    BincodeError(#[error(source)] bincode::Error),
    /// A record tag outside the known set was received.
    #[error(display = "ProtocolError: unknown record tag: {}.", _0)]
    UnknownRecordTag(u32),
    /// A framed buffer announced a length beyond the permitted maximum.
    #[error(
        display = "ProtocolError: framed buffer length {} exceeds the limit of {} bytes.",
        _0,
        _1
    )]
    FrameTooLarge(u64, u64),
}
