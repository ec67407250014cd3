//! # The shared chaincode record protocol
//!
//! Types shared between the untrusted chaincode proxy and the trusted
//! runtime: the fixed-layout records exchanged through the transport buffer,
//! the tagged messages carried over the duplex stream to the chaincode
//! wrapper, and the length-framed transport that moves those messages over a
//! socket.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

mod error;
mod message;
mod record;
mod transport;

pub use crate::error::ProtocolError;
pub use crate::message::{ChaincodeProxyMessage, ChaincodeWrapperMessage};
pub use crate::record::{
    copy_truncated, terminated_prefix, Acknowledgement, Arguments, InvocationResponse, KeyValue,
    RecordTag, TransportBuffer, ACKNOWLEDGEMENT_SIZE, ARGUMENT_COUNT, ARGUMENT_SIZE, KEY_SIZE,
    MAX_RECORD_SIZE, RESPONSE_SIZE, VALUE_SIZE,
};
pub use crate::transport::{receive_buffer, receive_message, send_buffer, send_message};
