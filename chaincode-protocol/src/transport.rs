//! Length-framed `bincode` transport for duplex messages.
//!
//! A frame is a little-endian `u64` length followed by that many bytes of
//! `bincode`-serialized message.  Both peers of the duplex stream use the
//! same framing in both directions.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::trace;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ProtocolError;

/// Upper bound on a received frame length.  Frames beyond this are treated
/// as a protocol violation rather than an allocation request.
const MAX_FRAME_SIZE: u64 = 0x100_0000;

/// Writes `buffer` to `stream` behind a little-endian length prefix.
pub fn send_buffer<S: Write>(mut stream: S, buffer: &[u8]) -> Result<(), ProtocolError> {
    stream.write_u64::<LittleEndian>(buffer.len() as u64)?;
    stream.write_all(buffer)?;
    stream.flush()?;
    Ok(())
}

/// Reads a length-prefixed buffer from `stream`.
pub fn receive_buffer<S: Read>(mut stream: S) -> Result<Vec<u8>, ProtocolError> {
    let length = stream.read_u64::<LittleEndian>()?;
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(length, MAX_FRAME_SIZE));
    }
    let mut buffer = vec![0u8; length as usize];
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Serializes `message` with `bincode` and sends it as one frame.
pub fn send_message<S: Write, M: Serialize>(stream: S, message: &M) -> Result<(), ProtocolError> {
    let encoded = bincode::serialize(message)?;
    trace!("Sending a {}-byte frame.", encoded.len());
    send_buffer(stream, &encoded)
}

/// Receives one frame from `stream` and deserializes it with `bincode`.
pub fn receive_message<S: Read, M: DeserializeOwned>(stream: S) -> Result<M, ProtocolError> {
    let encoded = receive_buffer(stream)?;
    trace!("Received a {}-byte frame.", encoded.len());
    Ok(bincode::deserialize(&encoded)?)
}
