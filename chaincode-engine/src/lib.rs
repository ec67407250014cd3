//! # The trusted chaincode execution engine
//!
//! Runs contract bytecode inside a `wasmi` interpreter under the trampoline
//! protocol: the guest can never block, so every ledger access returns
//! control to the host with a pending request recorded in the session, and a
//! later resume step re-enters the guest with the answer injected.
//!
//! The engine is organized as:
//!
//! - `session`: the per-invocation state shared between the dispatcher and
//!   the native bridge,
//! - `bridge`: the `cc_*` host functions the guest imports,
//! - `dispatcher`: instantiation and the start/resume stepping protocol,
//! - `runtime`: the command surface operating on tagged transport records.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

mod bridge;
mod error;
mod memory;
mod session;

pub mod dispatcher;
pub mod runtime;

pub use crate::dispatcher::{Dispatcher, ResumeAnswer, StepOutcome};
pub use crate::error::EngineError;
pub use crate::runtime::{TrustedRuntime, DEFAULT_HEAP_SIZE};
pub use crate::session::PendingRequest;
