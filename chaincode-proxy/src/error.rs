//! Error types for the chaincode proxy.
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

use chaincode_engine::EngineError;
use chaincode_protocol::ProtocolError;

/// Errors raised while serving proxy connections.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A command line argument was missing or malformed.
    #[error(display = "ProxyError: bad command line arguments: {}.", _0)]
    CommandLineArguments(String),
    /// An I/O error was raised on the listening socket.
    #[error(display = "ProxyError: I/O error: {}.", _0)]
    IOError(#[error(source)] std::io::Error),
    /// A transport-level error was raised on the duplex stream.
    #[error(display = "ProxyError: protocol error: {}.", _0)]
    ProtocolError(#[error(source)] ProtocolError),
    /// The trusted runtime refused a command.
    #[error(display = "ProxyError: engine error: {}.", _0)]
    EngineError(#[error(source)] EngineError),
    /// The requested bytecode file could not be read.
    #[error(display = "ProxyError: bytecode not found: {}.", _0)]
    BytecodeNotFound(String),
    /// The wrapper sent a message the duplex protocol does not allow at
    /// this point.
    #[error(display = "ProxyError: protocol violation: {}.", _0)]
    ProtocolViolation(String),
    /// The runtime mutex was poisoned by a panicking connection thread.
    #[error(display = "ProxyError: the runtime lock was poisoned.")]
    LockPoisoned,
    /// The runtime worker thread is no longer reachable.
    #[error(display = "ProxyError: the runtime worker is gone.")]
    RuntimeUnavailable,
}
