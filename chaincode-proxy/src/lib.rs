//! # The chaincode proxy
//!
//! The untrusted relay between the chaincode wrapper and the trusted
//! runtime.  Each connection carries exactly one invocation: the proxy
//! loads the requested bytecode, hands it to the runtime, relays every
//! state request out to the wrapper and every answer back in, and finally
//! forwards the invocation response.  The runtime is reset after every
//! invocation, success or failure.
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
mod relay;
mod worker;

pub use crate::error::ProxyError;
pub use crate::relay::{handle_connection, serve};
pub use crate::worker::{spawn_runtime, RuntimeClient};
