//! Per-invocation session state.
//!
//! The session is the single place where the native bridge and the
//! dispatcher meet: bridge calls record what the guest asked for, and the
//! dispatcher inspects the session after every step to decide whether the
//! invocation suspended or finished.  A session is owned by the dispatcher
//! and passed to the bridge by mutable reference, so stale state can never
//! leak between invocations as long as `reset` is called at every start.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use chaincode_protocol::{
    copy_truncated, terminated_prefix, Arguments, KEY_SIZE, RESPONSE_SIZE, VALUE_SIZE,
};

use crate::memory::GuestPtr;

/// The kind of state request the guest suspended on, if any.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PendingRequest {
    /// No request is outstanding.
    None,
    /// The guest asked for a ledger value and waits for the answer.
    GetState,
    /// The guest asked to store a ledger value and waits for the
    /// acknowledgement.
    PutState,
}

pub(crate) struct Session {
    /// The arguments record installed at the start of the invocation.
    arguments: Arguments,
    /// The request the guest suspended on during the last step.
    pending: PendingRequest,
    /// The key of the pending state request.
    key: [u8; KEY_SIZE],
    /// The value of a pending put-state request.
    value: [u8; VALUE_SIZE],
    /// Where the guest wants a get-state answer written.  Recorded at
    /// suspension time and revalidated at resume time.
    guest_out: Option<GuestPtr>,
    /// The contract's execution response.
    response: [u8; RESPONSE_SIZE],
    /// Whether the contract called the return-response bridge function at
    /// all, distinguishing an empty response from no response.
    has_response: bool,
    /// Output the guest wrote through the log bridge function, accumulated
    /// over the whole invocation.
    captured_output: Vec<u8>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Session {
            arguments: Arguments::new("", &[] as &[&str]),
            pending: PendingRequest::None,
            key: [0u8; KEY_SIZE],
            value: [0u8; VALUE_SIZE],
            guest_out: None,
            response: [0u8; RESPONSE_SIZE],
            has_response: false,
            captured_output: Vec::new(),
        }
    }

    /// Clears every field and installs the arguments for a new invocation.
    pub(crate) fn reset(&mut self, arguments: Arguments) {
        *self = Session::new();
        self.arguments = arguments;
    }

    pub(crate) fn function_name_bytes(&self) -> &[u8] {
        self.arguments.function_name_bytes()
    }

    /// The positional argument at `index`, or empty beyond the slot count.
    pub(crate) fn argument_bytes(&self, index: usize) -> &[u8] {
        self.arguments.argument_bytes(index).unwrap_or(&[])
    }

    /// Records a get-state suspension: the truncated key and the guest's
    /// output descriptor.  Returns the number of key bytes kept.
    pub(crate) fn record_get_state(&mut self, key: &[u8], out: GuestPtr) -> usize {
        let copied = copy_truncated(&mut self.key, key);
        self.value = [0u8; VALUE_SIZE];
        self.guest_out = Some(out);
        self.pending = PendingRequest::GetState;
        copied
    }

    /// Records a put-state suspension with the truncated key and value.
    pub(crate) fn record_put_state(&mut self, key: &[u8], value: &[u8]) {
        copy_truncated(&mut self.key, key);
        copy_truncated(&mut self.value, value);
        self.guest_out = None;
        self.pending = PendingRequest::PutState;
    }

    /// Records the contract's execution response.  Returns the number of
    /// bytes kept after truncation.
    pub(crate) fn record_response(&mut self, message: &[u8]) -> usize {
        let copied = copy_truncated(&mut self.response, message);
        self.has_response = true;
        copied
    }

    /// Appends guest log output to the captured output buffer.
    pub(crate) fn append_output(&mut self, bytes: &[u8]) {
        self.captured_output.extend_from_slice(bytes);
        self.captured_output.push(b'\n');
    }

    pub(crate) fn pending(&self) -> PendingRequest {
        self.pending
    }

    /// Clears the suspension marker once the dispatcher has taken over the
    /// request.  The recorded key, value, and output descriptor stay until
    /// consumed or overwritten.
    pub(crate) fn clear_pending(&mut self) {
        self.pending = PendingRequest::None;
    }

    /// Takes the recorded get-state output descriptor.
    pub(crate) fn take_guest_out(&mut self) -> Option<GuestPtr> {
        self.guest_out.take()
    }

    pub(crate) fn key_bytes(&self) -> &[u8] {
        terminated_prefix(&self.key)
    }

    pub(crate) fn value_bytes(&self) -> &[u8] {
        terminated_prefix(&self.value)
    }

    pub(crate) fn has_response(&self) -> bool {
        self.has_response
    }

    pub(crate) fn response_bytes(&self) -> &[u8] {
        terminated_prefix(&self.response)
    }

    /// Takes the output captured from the guest so far, leaving the buffer
    /// empty.
    pub(crate) fn take_captured_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.captured_output)
    }
}
