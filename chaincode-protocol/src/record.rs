//! Fixed-layout records exchanged through the transport buffer.
//!
//! Every value crossing the boundary between the relay and the trusted
//! runtime travels inside a single fixed-size transport buffer, accompanied
//! by an out-of-band tag naming which record currently occupies it.  All
//! string fields are fixed-capacity, NUL-terminated, and truncating: a source
//! longer than its field keeps the longest prefix that still leaves room for
//! the terminator.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use crate::error::ProtocolError;

////////////////////////////////////////////////////////////////////////////////
// Field capacities.
////////////////////////////////////////////////////////////////////////////////

/// Capacity of a state key field, including the NUL terminator.
pub const KEY_SIZE: usize = 64;
/// Capacity of a state value field, including the NUL terminator.
pub const VALUE_SIZE: usize = 256;
/// Capacity of a single argument slot, including the NUL terminator.
pub const ARGUMENT_SIZE: usize = 64;
/// Number of argument slots in an arguments record.  Slot 0 carries the
/// function name; the remaining slots carry positional arguments.
pub const ARGUMENT_COUNT: usize = 10;
/// Capacity of the execution response field, including the NUL terminator.
pub const RESPONSE_SIZE: usize = 256;
/// Capacity of the put-state acknowledgement field, including the NUL
/// terminator.
pub const ACKNOWLEDGEMENT_SIZE: usize = 20;
/// Size of the transport buffer: the largest record (the arguments record)
/// must fit.
pub const MAX_RECORD_SIZE: usize = ARGUMENT_SIZE * ARGUMENT_COUNT;

////////////////////////////////////////////////////////////////////////////////
// Field copy helpers.
////////////////////////////////////////////////////////////////////////////////

/// Copies `src` into `dst` with truncation, zero-filling `dst` first so that
/// the result is always NUL-terminated.  At most `dst.len() - 1` bytes are
/// copied.  Returns the number of bytes copied.
pub fn copy_truncated(dst: &mut [u8], src: &[u8]) -> usize {
    for byte in dst.iter_mut() {
        *byte = 0;
    }
    let length = src.len().min(dst.len().saturating_sub(1));
    dst[..length].copy_from_slice(&src[..length]);
    length
}

/// Returns the prefix of `field` up to, but not including, the first NUL
/// byte.  A field with no NUL is returned whole.
pub fn terminated_prefix(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

fn field_to_string(field: &[u8]) -> String {
    String::from_utf8_lossy(terminated_prefix(field)).into_owned()
}

////////////////////////////////////////////////////////////////////////////////
// Record tags.
////////////////////////////////////////////////////////////////////////////////

/// Out-of-band tag naming which record currently occupies the transport
/// buffer after a run or resume step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordTag {
    /// The buffer holds an invocation response record.
    InvocationResponse,
    /// The buffer holds a key-value record describing a get-state request.
    GetStateRequest,
    /// The buffer holds a key-value record describing a put-state request.
    PutStateRequest,
}

impl RecordTag {
    /// Decodes a wire tag, failing on values outside the known set.
    pub fn from_u32(tag: u32) -> Result<Self, ProtocolError> {
        match tag {
            0 => Ok(RecordTag::InvocationResponse),
            1 => Ok(RecordTag::GetStateRequest),
            2 => Ok(RecordTag::PutStateRequest),
            otherwise => Err(ProtocolError::UnknownRecordTag(otherwise)),
        }
    }

    /// Encodes the tag for the wire.
    pub fn to_u32(self) -> u32 {
        match self {
            RecordTag::InvocationResponse => 0,
            RecordTag::GetStateRequest => 1,
            RecordTag::PutStateRequest => 2,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// The transport buffer.
////////////////////////////////////////////////////////////////////////////////

/// The single fixed-size buffer through which records pass in both
/// directions.  Records overwrite the buffer whole: writing a record
/// zero-fills it first, so no bytes of the previous occupant survive.
#[derive(Clone)]
pub struct TransportBuffer {
    bytes: [u8; MAX_RECORD_SIZE],
}

impl TransportBuffer {
    /// Creates a zero-filled transport buffer.
    pub fn new() -> Self {
        TransportBuffer {
            bytes: [0u8; MAX_RECORD_SIZE],
        }
    }

    /// Zero-fills the buffer.
    pub fn clear(&mut self) {
        self.bytes = [0u8; MAX_RECORD_SIZE];
    }

    /// Read-only view of the buffer contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable view of the buffer contents.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Default for TransportBuffer {
    fn default() -> Self {
        TransportBuffer::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Records.
////////////////////////////////////////////////////////////////////////////////

/// The arguments record: the function name in slot 0 followed by up to
/// `ARGUMENT_COUNT - 1` positional arguments, each a fixed-capacity
/// NUL-terminated field.
#[derive(Clone)]
pub struct Arguments {
    slots: [[u8; ARGUMENT_SIZE]; ARGUMENT_COUNT],
}

impl Arguments {
    /// Builds an arguments record from a function name and positional
    /// arguments.  Overlong fields are truncated and arguments beyond the
    /// slot count are dropped.
    pub fn new<S: AsRef<str>>(function_name: &str, arguments: &[S]) -> Self {
        let mut slots = [[0u8; ARGUMENT_SIZE]; ARGUMENT_COUNT];
        copy_truncated(&mut slots[0], function_name.as_bytes());
        for (slot, argument) in slots[1..].iter_mut().zip(arguments.iter()) {
            copy_truncated(slot, argument.as_ref().as_bytes());
        }
        Arguments { slots }
    }

    /// The function name, as the terminated prefix of slot 0.
    pub fn function_name_bytes(&self) -> &[u8] {
        terminated_prefix(&self.slots[0])
    }

    /// The positional argument at `index`, or `None` beyond the slot count.
    /// Index 0 names the first argument after the function name.
    pub fn argument_bytes(&self, index: usize) -> Option<&[u8]> {
        self.slots
            .get(index.checked_add(1)?)
            .map(|slot| terminated_prefix(slot))
    }

    /// Serializes the record into the transport buffer, overwriting it.
    pub fn write_to(&self, buffer: &mut TransportBuffer) {
        buffer.clear();
        for (index, slot) in self.slots.iter().enumerate() {
            let offset = index * ARGUMENT_SIZE;
            buffer.as_bytes_mut()[offset..offset + ARGUMENT_SIZE].copy_from_slice(slot);
        }
    }

    /// Deserializes the record from the transport buffer.
    pub fn read_from(buffer: &TransportBuffer) -> Self {
        let mut slots = [[0u8; ARGUMENT_SIZE]; ARGUMENT_COUNT];
        for (index, slot) in slots.iter_mut().enumerate() {
            let offset = index * ARGUMENT_SIZE;
            slot.copy_from_slice(&buffer.as_bytes()[offset..offset + ARGUMENT_SIZE]);
        }
        Arguments { slots }
    }
}

/// The key-value record, carrying a state key and value pair.  Both
/// directions use it: the runtime emits it to describe get- and put-state
/// requests, and the relay fills the value field to answer a get-state
/// request.
#[derive(Clone)]
pub struct KeyValue {
    key: [u8; KEY_SIZE],
    value: [u8; VALUE_SIZE],
}

impl KeyValue {
    /// Builds a key-value record, truncating overlong fields.
    pub fn new(key: &[u8], value: &[u8]) -> Self {
        let mut record = KeyValue {
            key: [0u8; KEY_SIZE],
            value: [0u8; VALUE_SIZE],
        };
        copy_truncated(&mut record.key, key);
        copy_truncated(&mut record.value, value);
        record
    }

    /// Builds a record carrying only a value, with an empty key.  Used to
    /// answer a get-state request, where the requested key is implied.
    pub fn from_value(value: &[u8]) -> Self {
        KeyValue::new(&[], value)
    }

    /// The key, up to its terminator.
    pub fn key_bytes(&self) -> &[u8] {
        terminated_prefix(&self.key)
    }

    /// The value, up to its terminator.
    pub fn value_bytes(&self) -> &[u8] {
        terminated_prefix(&self.value)
    }

    /// The key as a lossily-decoded string.
    pub fn key_string(&self) -> String {
        field_to_string(&self.key)
    }

    /// The value as a lossily-decoded string.
    pub fn value_string(&self) -> String {
        field_to_string(&self.value)
    }

    /// Serializes the record into the transport buffer, overwriting it.
    pub fn write_to(&self, buffer: &mut TransportBuffer) {
        buffer.clear();
        buffer.as_bytes_mut()[..KEY_SIZE].copy_from_slice(&self.key);
        buffer.as_bytes_mut()[KEY_SIZE..KEY_SIZE + VALUE_SIZE].copy_from_slice(&self.value);
    }

    /// Deserializes the record from the transport buffer.
    pub fn read_from(buffer: &TransportBuffer) -> Self {
        let mut record = KeyValue {
            key: [0u8; KEY_SIZE],
            value: [0u8; VALUE_SIZE],
        };
        record.key.copy_from_slice(&buffer.as_bytes()[..KEY_SIZE]);
        record
            .value
            .copy_from_slice(&buffer.as_bytes()[KEY_SIZE..KEY_SIZE + VALUE_SIZE]);
        record
    }
}

/// The invocation response record, carrying the contract's final execution
/// response.
#[derive(Clone)]
pub struct InvocationResponse {
    execution_response: [u8; RESPONSE_SIZE],
}

impl InvocationResponse {
    /// Builds an invocation response record, truncating an overlong
    /// response.
    pub fn new(execution_response: &[u8]) -> Self {
        let mut record = InvocationResponse {
            execution_response: [0u8; RESPONSE_SIZE],
        };
        copy_truncated(&mut record.execution_response, execution_response);
        record
    }

    /// The execution response, up to its terminator.
    pub fn execution_response_bytes(&self) -> &[u8] {
        terminated_prefix(&self.execution_response)
    }

    /// The execution response as a lossily-decoded string.
    pub fn execution_response_string(&self) -> String {
        field_to_string(&self.execution_response)
    }

    /// Serializes the record into the transport buffer, overwriting it.
    pub fn write_to(&self, buffer: &mut TransportBuffer) {
        buffer.clear();
        buffer.as_bytes_mut()[..RESPONSE_SIZE].copy_from_slice(&self.execution_response);
    }

    /// Deserializes the record from the transport buffer.
    pub fn read_from(buffer: &TransportBuffer) -> Self {
        let mut record = InvocationResponse {
            execution_response: [0u8; RESPONSE_SIZE],
        };
        record
            .execution_response
            .copy_from_slice(&buffer.as_bytes()[..RESPONSE_SIZE]);
        record
    }
}

/// The acknowledgement record, answering a put-state request.  The content
/// is informational: the runtime resumes the contract regardless of what the
/// ledger answered.
#[derive(Clone)]
pub struct Acknowledgement {
    acknowledgement: [u8; ACKNOWLEDGEMENT_SIZE],
}

impl Acknowledgement {
    /// Builds an acknowledgement record, truncating an overlong field.
    pub fn new(acknowledgement: &[u8]) -> Self {
        let mut record = Acknowledgement {
            acknowledgement: [0u8; ACKNOWLEDGEMENT_SIZE],
        };
        copy_truncated(&mut record.acknowledgement, acknowledgement);
        record
    }

    /// The acknowledgement as a lossily-decoded string.
    pub fn acknowledgement_string(&self) -> String {
        field_to_string(&self.acknowledgement)
    }

    /// Serializes the record into the transport buffer, overwriting it.
    pub fn write_to(&self, buffer: &mut TransportBuffer) {
        buffer.clear();
        buffer.as_bytes_mut()[..ACKNOWLEDGEMENT_SIZE].copy_from_slice(&self.acknowledgement);
    }

    /// Deserializes the record from the transport buffer.
    pub fn read_from(buffer: &TransportBuffer) -> Self {
        let mut record = Acknowledgement {
            acknowledgement: [0u8; ACKNOWLEDGEMENT_SIZE],
        };
        record
            .acknowledgement
            .copy_from_slice(&buffer.as_bytes()[..ACKNOWLEDGEMENT_SIZE]);
        record
    }
}
