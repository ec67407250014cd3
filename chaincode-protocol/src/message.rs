//! Messages carried over the duplex stream between the chaincode wrapper and
//! the chaincode proxy.
//!
//! The wrapper opens the stream, sends an invocation request, answers any
//! state requests the proxy relays out, and finally receives the invocation
//! response.  Every message is serialized with `bincode` and framed with a
//! length prefix (see the `transport` module).
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use serde::{Deserialize, Serialize};

/// Messages sent by the chaincode wrapper to the chaincode proxy.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ChaincodeWrapperMessage {
    /// Ask the proxy to run a contract.  The first field names the compiled
    /// bytecode file, the second the contract function to invoke, and the
    /// third carries the positional arguments.
    InvocationRequest(String, String, Vec<String>),
    /// Answer an outstanding get-state request with the ledger value for the
    /// requested key.  An absent key is answered with the empty string.
    GetStateResponse(String),
    /// Answer an outstanding put-state request with an acknowledgement from
    /// the ledger.
    PutStateResponse(String),
}

/// Messages sent by the chaincode proxy to the chaincode wrapper.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ChaincodeProxyMessage {
    /// The contract finished: the field carries its execution response.
    InvocationResponse(String),
    /// The contract asked for the ledger value under the carried key.  The
    /// wrapper must answer with `GetStateResponse` before the contract can
    /// continue.
    GetStateRequest(String),
    /// The contract asked to store the carried key and value pair.  The
    /// wrapper must answer with `PutStateResponse` before the contract can
    /// continue.
    PutStateRequest(String, String),
}
