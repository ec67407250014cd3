//! The session trampoline dispatcher.
//!
//! The dispatcher instantiates contract bytecode and drives it through the
//! stepping protocol: `step_init` once at the start of an invocation, then
//! `step_resume` for every step after.  A step ends in one of three ways:
//! the contract suspended on a state request, the contract recorded its
//! execution response, or the contract did neither, which reads as a
//! finished invocation with no response.  Guest faults never propagate as
//! errors: a tolerated fault ends the step as if the guest had returned, and
//! any other fault ends the invocation with a sentinel response.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use log::{error, info, trace};
use wasmi::{
    memory_units::Bytes, ExternVal, ImportsBuilder, MemoryRef, Module, ModuleInstance, ModuleRef,
    TrapCode,
};

use chaincode_protocol::{
    Acknowledgement, Arguments, InvocationResponse, KeyValue, RecordTag, TransportBuffer,
};

use crate::bridge::{BridgeResolver, NativeBridge, BRIDGE_MODULE_NAME};
use crate::error::EngineError;
use crate::session::{PendingRequest, Session};

/// The guest entry point invoked once when an invocation starts.
const ENTRY_INIT: &str = "step_init";
/// The guest entry point invoked for every subsequent step.
const ENTRY_RESUME: &str = "step_resume";
/// The export name of the guest's linear memory.
const LINEAR_MEMORY_NAME: &str = "memory";

/// Sentinel response when the init entry point fails.
const STEP_INIT_FAILED_RESPONSE: &[u8] = b"STEP_INIT_FAILED";
/// Sentinel response when a resume step faults unrecoverably.
const RUNTIME_ERROR_RESPONSE: &[u8] = b"RUNTIME_ERROR";
/// Sentinel response when the contract set an empty response.
const EMPTY_RESPONSE_RESPONSE: &[u8] = b"EMPTY_RESPONSE";
/// Sentinel response when the contract never set a response.
const NO_RESPONSE_RESPONSE: &[u8] = b"NO_RESPONSE";

/// How a run or resume step left the invocation.
pub enum StepOutcome {
    /// The invocation finished with this execution response.
    Response(InvocationResponse),
    /// The contract suspended asking for the ledger value under the carried
    /// key.  The value field of the record is empty.
    GetState(KeyValue),
    /// The contract suspended asking to store the carried key and value.
    PutState(KeyValue),
}

impl StepOutcome {
    /// Serializes the outcome's record into the transport buffer and
    /// returns the matching tag.
    pub fn write_to(&self, buffer: &mut TransportBuffer) -> RecordTag {
        match self {
            StepOutcome::Response(record) => {
                record.write_to(buffer);
                RecordTag::InvocationResponse
            }
            StepOutcome::GetState(record) => {
                record.write_to(buffer);
                RecordTag::GetStateRequest
            }
            StepOutcome::PutState(record) => {
                record.write_to(buffer);
                RecordTag::PutStateRequest
            }
        }
    }
}

/// The answer that unblocks a suspended invocation.
pub enum ResumeAnswer {
    /// The ledger value answering a get-state request.
    StateValue(KeyValue),
    /// The ledger acknowledgement answering a put-state request.
    PutAcknowledged(Acknowledgement),
}

/// Where the dispatcher stands in an invocation's lifecycle.
#[derive(Clone, Copy)]
enum Phase {
    /// No invocation is in progress.
    Idle,
    /// An invocation is suspended on the carried state request.
    Suspended(PendingRequest),
    /// The last invocation finished; a new start is required.
    Done,
}

/// An instantiated guest module and its exported linear memory.
struct GuestInstance {
    module: ModuleRef,
    memory: MemoryRef,
}

/// Drives one contract invocation at a time through the stepping protocol.
pub struct Dispatcher {
    heap_limit: usize,
    session: Session,
    instance: Option<GuestInstance>,
    phase: Phase,
}

impl Dispatcher {
    /// Creates an idle dispatcher whose guests may use at most `heap_limit`
    /// bytes of linear memory.
    pub fn new(heap_limit: usize) -> Self {
        Dispatcher {
            heap_limit,
            session: Session::new(),
            instance: None,
            phase: Phase::Idle,
        }
    }

    /// Reconfigures the guest heap limit.  Takes effect at the next start.
    pub fn set_heap_limit(&mut self, heap_limit: usize) {
        self.heap_limit = heap_limit;
    }

    /// The state request the current invocation is suspended on, if any.
    pub fn pending(&self) -> PendingRequest {
        match self.phase {
            Phase::Suspended(pending) => pending,
            _ => PendingRequest::None,
        }
    }

    /// Starts a new invocation: instantiates `bytecode`, installs
    /// `arguments` into a fresh session, runs the init entry point, and
    /// takes the first step.  Any previous invocation is torn down first.
    pub fn start(
        &mut self,
        bytecode: &[u8],
        arguments: Arguments,
    ) -> Result<StepOutcome, EngineError> {
        self.teardown();
        self.session.reset(arguments);

        let module = Module::from_buffer(bytecode)
            .map_err(|err| EngineError::LoadError(err.to_string()))?;
        let imports = ImportsBuilder::new().with_resolver(BRIDGE_MODULE_NAME, &BridgeResolver);
        let not_started = ModuleInstance::new(&module, &imports)
            .map_err(|err| EngineError::LoadError(err.to_string()))?;
        if not_started.has_start() {
            return Err(EngineError::UnexpectedStartFunction);
        }
        let instance = not_started.assert_no_start();

        let memory = match instance.export_by_name(LINEAR_MEMORY_NAME) {
            Some(ExternVal::Memory(memory)) => memory,
            _ => return Err(EngineError::NoMemoryExported),
        };
        let memory_bytes: Bytes = memory.current_size().into();
        if memory_bytes.0 > self.heap_limit {
            return Err(EngineError::OutOfMemory(memory_bytes.0, self.heap_limit));
        }

        info!(
            "Instantiated a {}-byte module with {} bytes of linear memory.",
            bytecode.len(),
            memory_bytes.0
        );
        self.instance = Some(GuestInstance {
            module: instance,
            memory,
        });

        if !self.call_step(ENTRY_INIT) {
            return self.finish_with(STEP_INIT_FAILED_RESPONSE);
        }
        self.step()
    }

    /// Unblocks a suspended invocation with `answer` and takes the next
    /// step.  For a get-state answer the ledger value is written into the
    /// guest buffer recorded at suspension time, after revalidating the
    /// descriptor against current memory bounds.
    pub fn resume(&mut self, answer: ResumeAnswer) -> Result<StepOutcome, EngineError> {
        let pending = match self.phase {
            Phase::Suspended(pending) => pending,
            _ => return Err(EngineError::InvalidResume),
        };
        match (pending, answer) {
            (PendingRequest::GetState, ResumeAnswer::StateValue(record)) => {
                let memory = match &self.instance {
                    Some(instance) => instance.memory.clone(),
                    None => return Err(EngineError::InvalidResume),
                };
                match self.session.take_guest_out() {
                    Some(out) => {
                        if out
                            .write_terminated(&memory, record.value_bytes())
                            .is_none()
                        {
                            // The region went out of bounds since it was
                            // recorded.  The guest resumes with its buffer
                            // untouched.
                            error!("Discarding a stale get-state output descriptor.");
                        }
                    }
                    None => error!("No get-state output descriptor was recorded."),
                }
            }
            (PendingRequest::PutState, ResumeAnswer::PutAcknowledged(record)) => {
                trace!(
                    "Put-state acknowledged: {:?}.",
                    record.acknowledgement_string()
                );
            }
            _ => return Err(EngineError::AnswerMismatch),
        }
        self.session.clear_pending();
        self.phase = Phase::Idle;
        self.step()
    }

    /// Tears the current invocation down, dropping the guest instance.
    pub fn teardown(&mut self) {
        self.instance = None;
        self.phase = Phase::Idle;
        self.session.clear_pending();
    }

    /// Takes the output the guest logged so far.
    pub fn take_captured_output(&mut self) -> Vec<u8> {
        self.session.take_captured_output()
    }

    /// Runs the resume entry point once and classifies the result from the
    /// session: suspended on a state request, or finished.
    fn step(&mut self) -> Result<StepOutcome, EngineError> {
        if !self.call_step(ENTRY_RESUME) {
            return self.finish_with(RUNTIME_ERROR_RESPONSE);
        }
        match self.session.pending() {
            PendingRequest::GetState => {
                self.phase = Phase::Suspended(PendingRequest::GetState);
                Ok(StepOutcome::GetState(KeyValue::new(
                    self.session.key_bytes(),
                    &[],
                )))
            }
            PendingRequest::PutState => {
                self.phase = Phase::Suspended(PendingRequest::PutState);
                Ok(StepOutcome::PutState(KeyValue::new(
                    self.session.key_bytes(),
                    self.session.value_bytes(),
                )))
            }
            PendingRequest::None => {
                let response = if !self.session.has_response() {
                    NO_RESPONSE_RESPONSE
                } else if self.session.response_bytes().is_empty() {
                    EMPTY_RESPONSE_RESPONSE
                } else {
                    self.session.response_bytes()
                };
                let record = InvocationResponse::new(response);
                self.phase = Phase::Done;
                Ok(StepOutcome::Response(record))
            }
        }
    }

    /// Ends the invocation with a sentinel response.
    fn finish_with(&mut self, sentinel: &[u8]) -> Result<StepOutcome, EngineError> {
        self.phase = Phase::Done;
        Ok(StepOutcome::Response(InvocationResponse::new(sentinel)))
    }

    /// Invokes a guest entry point once.  Returns whether the step
    /// completed: a normal return and a tolerated memory fault both count,
    /// any other trap or error does not.  A step that grew linear memory
    /// past the configured pool does not complete either.
    fn call_step(&mut self, entry: &str) -> bool {
        let (module, memory) = match &self.instance {
            Some(instance) => (instance.module.clone(), instance.memory.clone()),
            None => return false,
        };
        let mut bridge = NativeBridge::new(&mut self.session, memory);
        let completed = match module.invoke_export(entry, &[], &mut bridge) {
            Ok(_) => true,
            Err(wasmi::Error::Trap(trap)) => {
                if let Some(TrapCode::MemoryAccessOutOfBounds) = trap.code() {
                    trace!("Tolerating a guest memory fault in {:?}.", entry);
                    true
                } else {
                    error!("Guest faulted in {:?}: {}.", entry, trap);
                    false
                }
            }
            Err(err) => {
                error!("Invoking {:?} failed: {}.", entry, err);
                false
            }
        };
        completed && !self.pool_exceeded()
    }

    /// Whether the guest has grown its linear memory past the configured
    /// pool.  Checked after every step: instantiation only bounds the
    /// initial memory, and a guest may grow mid-step.
    fn pool_exceeded(&self) -> bool {
        match &self.instance {
            Some(instance) => {
                let bytes: Bytes = instance.memory.current_size().into();
                if bytes.0 > self.heap_limit {
                    error!(
                        "Guest memory grew to {} bytes, past the pool of {} bytes.",
                        bytes.0, self.heap_limit
                    );
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }
}
