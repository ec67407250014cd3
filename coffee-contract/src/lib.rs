//! # The coffee chaincode contract
//!
//! A contract tracking per-person coffee counts with three functions:
//! `create` a record, `add` to it, and `query` it.  The contract runs under
//! the trampoline protocol, so it can never block on a ledger access:
//! every `get_state` or `put_state` call suspends the invocation, and the
//! host re-enters `step_resume` once the answer is available.  The state
//! machine in this crate makes those suspension points explicit.
//!
//! The ledger is reached through the [`Bridge`] trait.  On
//! `wasm32-unknown-unknown` the bridge is the `cc_*` host import surface
//! (see the `wasm` module); natively it is a test double, which is how the
//! business logic is tested without a WASM runtime in the loop.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

mod wasm;

/// Capacity of the function name buffer, including the NUL terminator.
pub const FUNCTION_MAX: usize = 64;
/// Capacity of a state key, including the NUL terminator.
pub const KEY_MAX: usize = 64;
/// Capacity of an argument, including the NUL terminator.
pub const ARG_MAX: usize = 64;
/// Capacity of a state value, including the NUL terminator.
pub const VALUE_MAX: usize = 256;

/// The contract's view of its host.  Buffer conventions follow the native
/// bridge: output buffers are zero-filled and NUL-terminated, overlong data
/// is truncated.  `get_state` only registers the output buffer; the answer
/// appears in it after the invocation is resumed.
pub trait Bridge {
    /// Copies the invoked function's name into `out`.  Returns the number
    /// of bytes copied.
    fn get_function(&mut self, out: &mut [u8]) -> usize;
    /// Copies the positional argument at `index` into `out`.  Returns the
    /// number of bytes copied.
    fn get_arg(&mut self, index: usize, out: &mut [u8]) -> usize;
    /// Asks for the ledger value under `key`, to be written into `out` by
    /// the time the invocation resumes.
    fn get_state(&mut self, key: &[u8], out: &mut [u8]);
    /// Asks to store `value` under `key`.  The store has happened by the
    /// time the invocation resumes.
    fn put_state(&mut self, key: &[u8], value: &[u8]);
    /// Records the contract's execution response.
    fn return_response(&mut self, message: &[u8]);
    /// Emits a line of diagnostic output.
    fn log(&mut self, message: &[u8]);
}

/// The function being executed.
#[derive(Clone, Copy, Eq, PartialEq)]
enum Operation {
    None,
    Create,
    Add,
    Query,
}

/// Where the current operation stands relative to its suspension points.
#[derive(Clone, Copy, Eq, PartialEq)]
enum Step {
    Start,
    AfterGet,
    AfterPut,
}

/// The contract state machine.  One instance lives for the whole
/// invocation; every host re-entry goes through [`Contract::step_resume`].
pub struct Contract {
    function: [u8; FUNCTION_MAX],
    person: [u8; KEY_MAX],
    amount: [u8; ARG_MAX],
    current_value: [u8; VALUE_MAX],
    operation: Operation,
    step: Step,
}

impl Contract {
    pub const fn new() -> Self {
        Contract {
            function: [0u8; FUNCTION_MAX],
            person: [0u8; KEY_MAX],
            amount: [0u8; ARG_MAX],
            current_value: [0u8; VALUE_MAX],
            operation: Operation::None,
            step: Step::Start,
        }
    }

    /// The init entry point.  All work is deferred to the first resume
    /// step, when the host has the invocation installed.
    pub fn step_init(&mut self) {}

    /// One step of the invocation.  Either dispatches a fresh invocation or
    /// continues the suspended operation.
    pub fn step_resume(&mut self, bridge: &mut dyn Bridge) {
        if self.operation == Operation::None {
            if self.function[0] == 0 {
                bridge.get_function(&mut self.function);
            }
            self.operation = match terminated(&self.function) {
                b"create" => Operation::Create,
                b"add" => Operation::Add,
                b"query" => Operation::Query,
                _ => {
                    bridge.log(b"unknown function");
                    self.finish(bridge, b"ERROR");
                    return;
                }
            };
            self.fetch_arguments_and_read_state(bridge);
            return;
        }
        match self.operation {
            Operation::Create => self.create_resume(bridge),
            Operation::Add => self.add_resume(bridge),
            Operation::Query => self.query_resume(bridge),
            Operation::None => (),
        }
    }

    /// Writes the answer to the registered ledger read into the contract's
    /// value buffer.  On `wasm32` the host performs this write directly
    /// into linear memory; the native test harness calls this instead.
    pub fn inject_state_value(&mut self, value: &[u8]) {
        self.current_value = [0u8; VALUE_MAX];
        let copied = value.len().min(VALUE_MAX - 1);
        self.current_value[..copied].copy_from_slice(&value[..copied]);
    }

    /// Every operation starts the same way: fetch the person (and amount,
    /// where used), then suspend on reading the person's current record.
    fn fetch_arguments_and_read_state(&mut self, bridge: &mut dyn Bridge) {
        self.person = [0u8; KEY_MAX];
        self.amount = [0u8; ARG_MAX];
        self.current_value = [0u8; VALUE_MAX];
        bridge.get_arg(0, &mut self.person);
        if self.operation != Operation::Query {
            bridge.get_arg(1, &mut self.amount);
        }
        let key_length = strlen(&self.person);
        bridge.get_state(&self.person[..key_length], &mut self.current_value);
        self.step = Step::AfterGet;
    }

    fn create_resume(&mut self, bridge: &mut dyn Bridge) {
        match self.step {
            Step::AfterGet => {
                if self.current_value[0] != 0 {
                    self.finish(bridge, b"EXIST");
                    return;
                }
                let key_length = strlen(&self.person);
                let amount_length = strlen(&self.amount);
                bridge.put_state(
                    &self.person[..key_length],
                    &self.amount[..amount_length],
                );
                self.step = Step::AfterPut;
            }
            Step::AfterPut => self.finish(bridge, b"OK"),
            Step::Start => (),
        }
    }

    fn add_resume(&mut self, bridge: &mut dyn Bridge) {
        match self.step {
            Step::AfterGet => {
                if self.current_value[0] == 0 {
                    self.finish(bridge, b"EMPTY");
                    return;
                }
                let total = parse_decimal(terminated(&self.current_value))
                    .wrapping_add(parse_decimal(terminated(&self.amount)));
                let mut formatted = [0u8; VALUE_MAX];
                let length = format_decimal(total, &mut formatted);
                let key_length = strlen(&self.person);
                bridge.put_state(&self.person[..key_length], &formatted[..length]);
                self.step = Step::AfterPut;
            }
            Step::AfterPut => self.finish(bridge, b"OK"),
            Step::Start => (),
        }
    }

    fn query_resume(&mut self, bridge: &mut dyn Bridge) {
        match self.step {
            Step::AfterGet => {
                if self.current_value[0] == 0 {
                    self.finish(bridge, b"NOTFOUND");
                    return;
                }
                let mut response = [0u8; VALUE_MAX];
                let length = strlen(&self.current_value);
                response[..length].copy_from_slice(&self.current_value[..length]);
                self.finish(bridge, &response[..length]);
            }
            Step::AfterPut | Step::Start => (),
        }
    }

    /// Records the response and rearms the state machine for the next
    /// invocation.
    fn finish(&mut self, bridge: &mut dyn Bridge, message: &[u8]) {
        bridge.return_response(message);
        self.function = [0u8; FUNCTION_MAX];
        self.operation = Operation::None;
        self.step = Step::Start;
    }
}

impl Default for Contract {
    fn default() -> Self {
        Contract::new()
    }
}

/// The prefix of `buffer` up to, but not including, the first NUL byte.
fn terminated(buffer: &[u8]) -> &[u8] {
    &buffer[..strlen(buffer)]
}

fn strlen(buffer: &[u8]) -> usize {
    buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len())
}

/// Parses a decimal prefix with wrapping 32-bit arithmetic, the width of a
/// `wasm32` guest's `unsigned long`.  Parsing stops at the first non-digit.
fn parse_decimal(digits: &[u8]) -> u32 {
    let mut value: u32 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            break;
        }
        value = value.wrapping_mul(10).wrapping_add(u32::from(byte - b'0'));
    }
    value
}

/// Formats `value` in decimal into `out`.  Returns the number of bytes
/// written.
fn format_decimal(value: u32, out: &mut [u8]) -> usize {
    let mut digits = [0u8; 10];
    let mut remaining = value;
    let mut count = 0;
    loop {
        digits[count] = b'0' + (remaining % 10) as u8;
        remaining /= 10;
        count += 1;
        if remaining == 0 {
            break;
        }
    }
    for index in 0..count {
        out[index] = digits[count - 1 - index];
    }
    count
}
