//! Tests driving the contract state machine natively against a scripted
//! bridge, with a harness standing in for the trampoline: it answers each
//! suspension and re-enters the contract until a response appears.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use std::collections::HashMap;

use coffee_contract::{Bridge, Contract};

/// A ledger access the contract suspended on.
enum Pending {
    Get(String),
    Put(String, String),
}

/// A scripted host for one or more invocations.
struct MockBridge {
    function: String,
    arguments: Vec<String>,
    store: HashMap<String, String>,
    pending: Option<Pending>,
    response: Option<String>,
    get_count: usize,
    put_count: usize,
    log_lines: Vec<String>,
}

impl MockBridge {
    fn new(function: &str, arguments: &[&str]) -> Self {
        MockBridge {
            function: function.to_string(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
            store: HashMap::new(),
            pending: None,
            response: None,
            get_count: 0,
            put_count: 0,
            log_lines: Vec::new(),
        }
    }

    fn with_record(mut self, key: &str, value: &str) -> Self {
        self.store.insert(key.to_string(), value.to_string());
        self
    }
}

/// Zero-fills `out` and copies a NUL-terminated truncation of `source` into
/// it, exactly as the native bridge treats guest output buffers.
fn copy_out(out: &mut [u8], source: &[u8]) -> usize {
    for byte in out.iter_mut() {
        *byte = 0;
    }
    let copied = source.len().min(out.len().saturating_sub(1));
    out[..copied].copy_from_slice(&source[..copied]);
    copied
}

impl Bridge for MockBridge {
    fn get_function(&mut self, out: &mut [u8]) -> usize {
        let function = self.function.clone();
        copy_out(out, function.as_bytes())
    }

    fn get_arg(&mut self, index: usize, out: &mut [u8]) -> usize {
        let argument = self.arguments.get(index).cloned().unwrap_or_default();
        copy_out(out, argument.as_bytes())
    }

    fn get_state(&mut self, key: &[u8], _out: &mut [u8]) {
        self.get_count += 1;
        self.pending = Some(Pending::Get(
            String::from_utf8_lossy(key).into_owned(),
        ));
    }

    fn put_state(&mut self, key: &[u8], value: &[u8]) {
        self.put_count += 1;
        self.pending = Some(Pending::Put(
            String::from_utf8_lossy(key).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        ));
    }

    fn return_response(&mut self, message: &[u8]) {
        self.response = Some(String::from_utf8_lossy(message).into_owned());
    }

    fn log(&mut self, message: &[u8]) {
        self.log_lines
            .push(String::from_utf8_lossy(message).into_owned());
    }
}

/// Steps the contract until it responds, answering each suspension from the
/// bridge's store.
fn invoke(contract: &mut Contract, bridge: &mut MockBridge) -> String {
    contract.step_init();
    for _ in 0..16 {
        contract.step_resume(bridge);
        match bridge.pending.take() {
            Some(Pending::Get(key)) => {
                let value = bridge.store.get(&key).cloned().unwrap_or_default();
                contract.inject_state_value(value.as_bytes());
            }
            Some(Pending::Put(key, value)) => {
                bridge.store.insert(key, value);
            }
            None => {
                return bridge
                    .response
                    .take()
                    .expect("contract finished without a response");
            }
        }
    }
    panic!("contract did not settle within the step limit");
}

#[test]
fn create_stores_a_new_record() {
    let mut contract = Contract::new();
    let mut bridge = MockBridge::new("create", &["alice", "100"]);
    assert_eq!(invoke(&mut contract, &mut bridge), "OK");
    assert_eq!(bridge.store.get("alice").map(String::as_str), Some("100"));
    // One read to check for the record, one write to create it.
    assert_eq!((bridge.get_count, bridge.put_count), (1, 1));
}

#[test]
fn create_refuses_an_existing_record() {
    let mut contract = Contract::new();
    let mut bridge =
        MockBridge::new("create", &["alice", "500"]).with_record("alice", "100");
    assert_eq!(invoke(&mut contract, &mut bridge), "EXIST");
    assert_eq!(bridge.store.get("alice").map(String::as_str), Some("100"));
    assert_eq!((bridge.get_count, bridge.put_count), (1, 0));
}

#[test]
fn add_increments_an_existing_record() {
    let mut contract = Contract::new();
    let mut bridge = MockBridge::new("add", &["alice", "50"]).with_record("alice", "100");
    assert_eq!(invoke(&mut contract, &mut bridge), "OK");
    assert_eq!(bridge.store.get("alice").map(String::as_str), Some("150"));
    assert_eq!((bridge.get_count, bridge.put_count), (1, 1));
}

#[test]
fn add_to_a_missing_record_is_refused() {
    let mut contract = Contract::new();
    let mut bridge = MockBridge::new("add", &["alice", "50"]);
    assert_eq!(invoke(&mut contract, &mut bridge), "EMPTY");
    assert!(bridge.store.is_empty());
    assert_eq!((bridge.get_count, bridge.put_count), (1, 0));
}

#[test]
fn add_wraps_at_thirty_two_bits() {
    let mut contract = Contract::new();
    let mut bridge =
        MockBridge::new("add", &["alice", "1"]).with_record("alice", "4294967295");
    assert_eq!(invoke(&mut contract, &mut bridge), "OK");
    assert_eq!(bridge.store.get("alice").map(String::as_str), Some("0"));
}

#[test]
fn query_returns_the_stored_value() {
    let mut contract = Contract::new();
    let mut bridge = MockBridge::new("query", &["alice"]).with_record("alice", "150");
    assert_eq!(invoke(&mut contract, &mut bridge), "150");
    assert_eq!((bridge.get_count, bridge.put_count), (1, 0));
}

#[test]
fn query_of_a_missing_record_is_refused() {
    let mut contract = Contract::new();
    let mut bridge = MockBridge::new("query", &["nobody"]);
    assert_eq!(invoke(&mut contract, &mut bridge), "NOTFOUND");
}

#[test]
fn query_is_idempotent_across_invocations() {
    let mut contract = Contract::new();
    let mut bridge = MockBridge::new("query", &["alice"]).with_record("alice", "7");
    assert_eq!(invoke(&mut contract, &mut bridge), "7");
    assert_eq!(invoke(&mut contract, &mut bridge), "7");
    assert_eq!(bridge.store.get("alice").map(String::as_str), Some("7"));
}

#[test]
fn unknown_functions_are_refused_without_touching_state() {
    let mut contract = Contract::new();
    let mut bridge = MockBridge::new("delete", &["alice"]);
    assert_eq!(invoke(&mut contract, &mut bridge), "ERROR");
    assert_eq!((bridge.get_count, bridge.put_count), (0, 0));
    assert_eq!(bridge.log_lines, vec!["unknown function".to_string()]);
}

#[test]
fn overlong_person_names_truncate_to_the_key_capacity() {
    let long = "p".repeat(100);
    let mut contract = Contract::new();
    let mut bridge = MockBridge::new("create", &[long.as_str(), "1"]);
    assert_eq!(invoke(&mut contract, &mut bridge), "OK");
    let truncated = "p".repeat(coffee_contract::KEY_MAX - 1);
    assert_eq!(bridge.store.get(&truncated).map(String::as_str), Some("1"));
}
