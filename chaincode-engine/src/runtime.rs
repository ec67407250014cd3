//! The trusted runtime command surface.
//!
//! Three commands drive the engine from outside the trust boundary:
//! configure the guest heap pool, start running bytecode, and resume a
//! suspended run.  Run and resume both communicate through a single
//! transport buffer paired with an in/out record tag: on entry the buffer
//! holds the caller's record, on exit it holds the record the step produced.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use log::info;

use chaincode_protocol::{
    Acknowledgement, Arguments, KeyValue, RecordTag, TransportBuffer,
};

use crate::dispatcher::{Dispatcher, ResumeAnswer};
use crate::error::EngineError;
use crate::session::PendingRequest;

/// The guest heap pool used until `configure_heap` says otherwise.
pub const DEFAULT_HEAP_SIZE: usize = 10 * 1024 * 1024;

/// The engine as seen from outside the trust boundary.
pub struct TrustedRuntime {
    dispatcher: Dispatcher,
}

impl TrustedRuntime {
    /// Creates a runtime with the default guest heap pool.
    pub fn new() -> Self {
        TrustedRuntime {
            dispatcher: Dispatcher::new(DEFAULT_HEAP_SIZE),
        }
    }

    /// Bounds the linear memory available to guests.  Takes effect at the
    /// next `run_wasm`.
    pub fn configure_heap(&mut self, bytes: u32) {
        info!("Configuring a guest heap pool of {} bytes.", bytes);
        self.dispatcher.set_heap_limit(bytes as usize);
    }

    /// Starts an invocation.  The buffer must hold an arguments record on
    /// entry; on success it holds the produced record, named by the
    /// returned tag.
    pub fn run_wasm(
        &mut self,
        bytecode: &[u8],
        buffer: &mut TransportBuffer,
    ) -> Result<RecordTag, EngineError> {
        let arguments = Arguments::read_from(buffer);
        info!(
            "Running an invocation of {:?}.",
            String::from_utf8_lossy(arguments.function_name_bytes())
        );
        let outcome = self.dispatcher.start(bytecode, arguments)?;
        Ok(outcome.write_to(buffer))
    }

    /// Resumes a suspended invocation.  The buffer must hold the record
    /// answering the pending request: a key-value record with the ledger
    /// value for a get-state suspension, an acknowledgement record for a
    /// put-state suspension.
    pub fn resume_wasm(&mut self, buffer: &mut TransportBuffer) -> Result<RecordTag, EngineError> {
        let answer = match self.dispatcher.pending() {
            PendingRequest::GetState => {
                ResumeAnswer::StateValue(KeyValue::read_from(buffer))
            }
            PendingRequest::PutState => {
                ResumeAnswer::PutAcknowledged(Acknowledgement::read_from(buffer))
            }
            PendingRequest::None => return Err(EngineError::InvalidResume),
        };
        let outcome = self.dispatcher.resume(answer)?;
        Ok(outcome.write_to(buffer))
    }

    /// Tears down any invocation in progress, returning the runtime to its
    /// initial state.  The heap configuration survives.
    pub fn restart(&mut self) {
        info!("Restarting the trusted runtime.");
        self.dispatcher.teardown();
    }

    /// Takes the output the guest logged through the bridge so far.
    pub fn take_captured_output(&mut self) -> Vec<u8> {
        self.dispatcher.take_captured_output()
    }
}

impl Default for TrustedRuntime {
    fn default() -> Self {
        TrustedRuntime::new()
    }
}
