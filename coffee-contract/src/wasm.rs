//! The `wasm32` guest shim: binds the contract state machine to the `cc_*`
//! host import surface and exports the `step_init`/`step_resume` entry
//! points the trusted runtime invokes.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

#![cfg(target_arch = "wasm32")]

use core::ptr::addr_of_mut;

use crate::{Bridge, Contract};

extern "C" {
    fn cc_get_function(out: *mut u8, out_len: i32) -> i32;
    fn cc_get_arg(index: i32, out: *mut u8, out_len: i32) -> i32;
    fn cc_get_state(key: *const u8, key_len: i32, out: *mut u8, out_len: i32) -> i32;
    fn cc_put_state(key: *const u8, key_len: i32, value: *const u8, value_len: i32) -> i32;
    fn cc_return_response(message: *const u8, message_len: i32) -> i32;
    fn cc_log(message: *const u8, message_len: i32) -> i32;
}

/// The native bridge as imported from the host.
struct HostBridge;

impl Bridge for HostBridge {
    fn get_function(&mut self, out: &mut [u8]) -> usize {
        unsafe { cc_get_function(out.as_mut_ptr(), out.len() as i32).max(0) as usize }
    }

    fn get_arg(&mut self, index: usize, out: &mut [u8]) -> usize {
        unsafe { cc_get_arg(index as i32, out.as_mut_ptr(), out.len() as i32).max(0) as usize }
    }

    fn get_state(&mut self, key: &[u8], out: &mut [u8]) {
        unsafe {
            cc_get_state(
                key.as_ptr(),
                key.len() as i32,
                out.as_mut_ptr(),
                out.len() as i32,
            );
        }
    }

    fn put_state(&mut self, key: &[u8], value: &[u8]) {
        unsafe {
            cc_put_state(
                key.as_ptr(),
                key.len() as i32,
                value.as_ptr(),
                value.len() as i32,
            );
        }
    }

    fn return_response(&mut self, message: &[u8]) {
        unsafe {
            cc_return_response(message.as_ptr(), message.len() as i32);
        }
    }

    fn log(&mut self, message: &[u8]) {
        unsafe {
            cc_log(message.as_ptr(), message.len() as i32);
        }
    }
}

/// The contract instance for this invocation.  The runtime instantiates a
/// fresh module per invocation and steps it from a single thread, so a
/// static instance is sound here.
static mut CONTRACT: Contract = Contract::new();

#[no_mangle]
pub extern "C" fn step_init() {
    unsafe { (*addr_of_mut!(CONTRACT)).step_init() }
}

#[no_mangle]
pub extern "C" fn step_resume() {
    unsafe { (*addr_of_mut!(CONTRACT)).step_resume(&mut HostBridge) }
}
