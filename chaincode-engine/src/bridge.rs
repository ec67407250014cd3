//! The native bridge: the `cc_*` host functions the guest imports.
//!
//! Every bridge function takes `i32` arguments and returns an `i32`.  The
//! convention for guest buffers is truncating and NUL-terminating: an output
//! region is zero-filled, then filled with at most `length - 1` bytes, and
//! the number of bytes copied is returned.  An invalid pointer or
//! non-positive length makes the call return `0` without touching memory or
//! the session.  Only `cc_get_state` and `cc_put_state` suspend the guest;
//! the rest complete inline.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use log::trace;
use wasmi::{
    Externals, FuncInstance, FuncRef, MemoryRef, ModuleImportResolver, RuntimeArgs, RuntimeValue,
    Signature, Trap, ValueType,
};

use crate::error::{mk_host_trap, mk_return, BridgeFault};
use crate::memory::GuestPtr;
use crate::session::Session;

////////////////////////////////////////////////////////////////////////////////
// The host call table.
////////////////////////////////////////////////////////////////////////////////

/// Name of the import module the guest resolves the bridge under.
pub(crate) const BRIDGE_MODULE_NAME: &str = "env";

const BRIDGE_GET_FUNCTION_NAME: &str = "cc_get_function";
const BRIDGE_GET_ARG_NAME: &str = "cc_get_arg";
const BRIDGE_GET_STATE_NAME: &str = "cc_get_state";
const BRIDGE_PUT_STATE_NAME: &str = "cc_put_state";
const BRIDGE_RETURN_RESPONSE_NAME: &str = "cc_return_response";
const BRIDGE_LOG_NAME: &str = "cc_log";

const BRIDGE_GET_FUNCTION_CODE: usize = 0;
const BRIDGE_GET_ARG_CODE: usize = 1;
const BRIDGE_GET_STATE_CODE: usize = 2;
const BRIDGE_PUT_STATE_CODE: usize = 3;
const BRIDGE_RETURN_RESPONSE_CODE: usize = 4;
const BRIDGE_LOG_CODE: usize = 5;

/// Checks that an import site's signature takes exactly `params` and returns
/// an `i32`.
fn check_signature(signature: &Signature, params: &[ValueType]) -> bool {
    signature.params() == params && signature.return_type() == Some(ValueType::I32)
}

/// Resolves the guest's imports from the `env` module against the bridge's
/// host call table, rejecting unknown names and mismatched signatures at
/// instantiation time.
pub(crate) struct BridgeResolver;

impl ModuleImportResolver for BridgeResolver {
    fn resolve_func(&self, field_name: &str, signature: &Signature) -> Result<FuncRef, wasmi::Error> {
        let (code, params): (usize, &'static [ValueType]) = match field_name {
            BRIDGE_GET_FUNCTION_NAME => (BRIDGE_GET_FUNCTION_CODE, &[ValueType::I32; 2]),
            BRIDGE_GET_ARG_NAME => (BRIDGE_GET_ARG_CODE, &[ValueType::I32; 3]),
            BRIDGE_GET_STATE_NAME => (BRIDGE_GET_STATE_CODE, &[ValueType::I32; 4]),
            BRIDGE_PUT_STATE_NAME => (BRIDGE_PUT_STATE_CODE, &[ValueType::I32; 4]),
            BRIDGE_RETURN_RESPONSE_NAME => (BRIDGE_RETURN_RESPONSE_CODE, &[ValueType::I32; 2]),
            BRIDGE_LOG_NAME => (BRIDGE_LOG_CODE, &[ValueType::I32; 2]),
            otherwise => {
                return Err(wasmi::Error::Instantiation(format!(
                    "Unknown function import: {}::{}.",
                    BRIDGE_MODULE_NAME, otherwise
                )))
            }
        };
        if !check_signature(signature, params) {
            return Err(wasmi::Error::Instantiation(format!(
                "Signature mismatch for function import: {}::{}.",
                BRIDGE_MODULE_NAME, field_name
            )));
        }
        Ok(FuncInstance::alloc_host(
            Signature::new(params, Some(ValueType::I32)),
            code,
        ))
    }
}

////////////////////////////////////////////////////////////////////////////////
// The bridge proper.
////////////////////////////////////////////////////////////////////////////////

/// The externals the guest runs against during one step: the session to
/// record requests into and the guest's exported linear memory.
pub(crate) struct NativeBridge<'a> {
    session: &'a mut Session,
    memory: MemoryRef,
}

impl<'a> NativeBridge<'a> {
    pub(crate) fn new(session: &'a mut Session, memory: MemoryRef) -> Self {
        NativeBridge { session, memory }
    }

    /// Reads a guest input buffer, or `None` when the descriptor is invalid.
    fn read_guest(&self, address: u32, length: i32) -> Option<Vec<u8>> {
        GuestPtr::new(address, length)?.read(&self.memory)
    }

    /// `cc_get_function(out, out_len)`: copies the invoked function's name
    /// into the guest buffer.
    fn get_function(&mut self, args: RuntimeArgs) -> Result<i32, Trap> {
        let address: u32 = args.nth_checked(0)?;
        let length: i32 = args.nth_checked(1)?;
        let out = match GuestPtr::new(address, length) {
            Some(out) => out,
            None => return Ok(0),
        };
        let name = self.session.function_name_bytes().to_vec();
        match out.write_terminated(&self.memory, &name) {
            Some(copied) => Ok(copied as i32),
            None => Ok(0),
        }
    }

    /// `cc_get_arg(index, out, out_len)`: copies the positional argument at
    /// `index` into the guest buffer.  Out-of-range indices read as empty.
    fn get_arg(&mut self, args: RuntimeArgs) -> Result<i32, Trap> {
        let index: i32 = args.nth_checked(0)?;
        let address: u32 = args.nth_checked(1)?;
        let length: i32 = args.nth_checked(2)?;
        if index < 0 {
            return Ok(0);
        }
        let out = match GuestPtr::new(address, length) {
            Some(out) => out,
            None => return Ok(0),
        };
        let argument = self.session.argument_bytes(index as usize).to_vec();
        match out.write_terminated(&self.memory, &argument) {
            Some(copied) => Ok(copied as i32),
            None => Ok(0),
        }
    }

    /// `cc_get_state(key, key_len, out, out_len)`: records a get-state
    /// suspension.  The answer is written into the guest's output buffer at
    /// resume time, so the descriptor is recorded now and dereferenced only
    /// after revalidation.  Returns the truncated key length.
    fn get_state(&mut self, args: RuntimeArgs) -> Result<i32, Trap> {
        let key_address: u32 = args.nth_checked(0)?;
        let key_length: i32 = args.nth_checked(1)?;
        let out_address: u32 = args.nth_checked(2)?;
        let out_length: i32 = args.nth_checked(3)?;
        let key = match self.read_guest(key_address, key_length) {
            Some(key) => key,
            None => return Ok(0),
        };
        let out = match GuestPtr::new(out_address, out_length) {
            Some(out) if out.in_bounds(&self.memory) => out,
            _ => return Ok(0),
        };
        let copied = self.session.record_get_state(&key, out);
        trace!(
            "Guest suspended on a get-state request for key {:?}.",
            String::from_utf8_lossy(self.session.key_bytes())
        );
        Ok(copied as i32)
    }

    /// `cc_put_state(key, key_len, value, value_len)`: records a put-state
    /// suspension.  Returns `-1`: the store has not happened yet when the
    /// call returns, only once the ledger acknowledges.
    fn put_state(&mut self, args: RuntimeArgs) -> Result<i32, Trap> {
        let key_address: u32 = args.nth_checked(0)?;
        let key_length: i32 = args.nth_checked(1)?;
        let value_address: u32 = args.nth_checked(2)?;
        let value_length: i32 = args.nth_checked(3)?;
        let key = match self.read_guest(key_address, key_length) {
            Some(key) => key,
            None => return Ok(0),
        };
        let value = match self.read_guest(value_address, value_length) {
            Some(value) => value,
            None => return Ok(0),
        };
        self.session.record_put_state(&key, &value);
        trace!(
            "Guest suspended on a put-state request for key {:?}.",
            String::from_utf8_lossy(self.session.key_bytes())
        );
        Ok(-1)
    }

    /// `cc_return_response(message, message_len)`: records the contract's
    /// execution response.  A zero length records an empty response, which
    /// is still a response.  Returns the truncated response length.
    fn return_response(&mut self, args: RuntimeArgs) -> Result<i32, Trap> {
        let address: u32 = args.nth_checked(0)?;
        let length: i32 = args.nth_checked(1)?;
        let message = if length == 0 {
            Vec::new()
        } else {
            match self.read_guest(address, length) {
                Some(message) => message,
                None => return Ok(0),
            }
        };
        let copied = self.session.record_response(&message);
        Ok(copied as i32)
    }

    /// `cc_log(message, message_len)`: captures a line of guest output into
    /// the session.  Returns the number of bytes captured.
    fn guest_log(&mut self, args: RuntimeArgs) -> Result<i32, Trap> {
        let address: u32 = args.nth_checked(0)?;
        let length: i32 = args.nth_checked(1)?;
        let message = match self.read_guest(address, length) {
            Some(message) => message,
            None => return Ok(0),
        };
        trace!("Guest log: {}.", String::from_utf8_lossy(&message));
        self.session.append_output(&message);
        Ok(message.len() as i32)
    }
}

impl<'a> Externals for NativeBridge<'a> {
    fn invoke_index(
        &mut self,
        index: usize,
        args: RuntimeArgs,
    ) -> Result<Option<RuntimeValue>, Trap> {
        match index {
            BRIDGE_GET_FUNCTION_CODE => {
                let result = self.get_function(args)?;
                mk_return(result)
            }
            BRIDGE_GET_ARG_CODE => {
                let result = self.get_arg(args)?;
                mk_return(result)
            }
            BRIDGE_GET_STATE_CODE => {
                let result = self.get_state(args)?;
                mk_return(result)
            }
            BRIDGE_PUT_STATE_CODE => {
                let result = self.put_state(args)?;
                mk_return(result)
            }
            BRIDGE_RETURN_RESPONSE_CODE => {
                let result = self.return_response(args)?;
                mk_return(result)
            }
            BRIDGE_LOG_CODE => {
                let result = self.guest_log(args)?;
                mk_return(result)
            }
            otherwise => mk_host_trap(BridgeFault::UnknownHostFunction(otherwise)),
        }
    }
}
