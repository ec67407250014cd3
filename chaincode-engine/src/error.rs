//! Error handling for the trusted chaincode execution engine.
//!
//! Two layers of error exist.  `BridgeFault` is raised from inside a native
//! bridge call and surfaces as a WASMI host trap; it covers only conditions
//! that make continuing the guest meaningless, such as an unknown host
//! function index.  Recoverable conditions, like an invalid guest buffer,
//! are reported to the guest through sentinel return values instead.
//! `EngineError` is the dispatcher- and runtime-level error type returned to
//! callers of the command surface.
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
use wasmi::{HostError, RuntimeValue, Trap};

/// Fatal faults raised inside a native bridge call.  These abort the current
/// guest step as a host trap.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BridgeFault {
    /// The guest invoked a host function index outside the bridge's table.
    /// Unreachable if instantiation resolved imports correctly.
    #[error(display = "BridgeFault: unknown host function index: {}.", _0)]
    UnknownHostFunction(usize),
}

impl HostError for BridgeFault {}

/// Errors reported by the dispatcher and the runtime command surface.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The supplied bytecode could not be parsed or instantiated as a WASM
    /// module.
    #[error(display = "EngineError: failed to load the WASM module: {}.", _0)]
    LoadError(String),
    /// The module carries a start function, which would run outside the
    /// stepping protocol.
    #[error(display = "EngineError: the WASM module carries a start function.")]
    UnexpectedStartFunction,
    /// The module does not export its linear memory under the name `memory`.
    #[error(display = "EngineError: the WASM module exports no linear memory.")]
    NoMemoryExported,
    /// The module's initial linear memory exceeds the configured heap pool.
    #[error(
        display = "EngineError: guest memory of {} bytes exceeds the configured pool of {} bytes.",
        _0,
        _1
    )]
    OutOfMemory(usize, usize),
    /// A resume was requested with no invocation suspended on a state
    /// request.
    #[error(display = "EngineError: no suspended state request to resume.")]
    InvalidResume,
    /// The resume answer does not match the kind of the suspended request.
    #[error(display = "EngineError: resume answer does not match the pending request.")]
    AnswerMismatch,
}

/// Builds a host function's `i32` return value.
#[inline]
pub(crate) fn mk_return<T>(value: i32) -> Result<Option<RuntimeValue>, T> {
    Ok(Some(RuntimeValue::I32(value)))
}

/// Builds a host trap from a fatal bridge fault.
#[inline]
pub(crate) fn mk_host_trap<T>(fault: BridgeFault) -> Result<T, Trap> {
    Err(Trap::host(fault))
}
