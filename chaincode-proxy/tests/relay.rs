//! Integration tests driving one end of the duplex stream as a scripted
//! wrapper while the proxy serves the other end.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use std::fs;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use chaincode_protocol::{
    receive_message, send_message, ChaincodeProxyMessage, ChaincodeWrapperMessage,
};
use chaincode_proxy::{handle_connection, spawn_runtime, ProxyError};

/// A guest that reads `balance`, stores `42` under it, and responds with
/// the first five bytes of the read answer.
const GET_PUT_GUEST: &str = r#"
(module
  (import "env" "cc_get_state" (func $get_state (param i32 i32 i32 i32) (result i32)))
  (import "env" "cc_put_state" (func $put_state (param i32 i32 i32 i32) (result i32)))
  (import "env" "cc_return_response" (func $return_response (param i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 16) "balance")
  (data (i32.const 32) "42")
  (global $phase (mut i32) (i32.const 0))
  (func (export "step_init"))
  (func (export "step_resume")
    (block $done
      (if (i32.eqz (global.get $phase))
        (then
          (drop (call $get_state (i32.const 16) (i32.const 7) (i32.const 256) (i32.const 64)))
          (global.set $phase (i32.const 1))
          (br $done)))
      (if (i32.eq (global.get $phase) (i32.const 1))
        (then
          (drop (call $put_state (i32.const 16) (i32.const 7) (i32.const 32) (i32.const 2)))
          (global.set $phase (i32.const 2))
          (br $done)))
      (drop (call $return_response (i32.const 256) (i32.const 5))))))
"#;

/// Writes the test guest into a fresh per-test chaincode directory.
fn deploy_guest(test_name: &str) -> PathBuf {
    let directory = std::env::temp_dir().join(format!(
        "chaincode-proxy-test-{}-{}",
        std::process::id(),
        test_name
    ));
    fs::create_dir_all(&directory).unwrap();
    let bytecode = wat::parse_str(GET_PUT_GUEST).unwrap();
    fs::write(directory.join("guest.wasm"), bytecode).unwrap();
    directory
}

/// Accepts `connections` wrapper connections on a fresh listener, serving
/// each through `handle_connection` on its own thread as the real server
/// does, and returns the listening address and the join handle yielding
/// the per-connection results.
fn spawn_proxy(
    directory: PathBuf,
    connections: usize,
) -> (String, thread::JoinHandle<Vec<Result<(), ProxyError>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
    let handle = thread::spawn(move || {
        let runtime = Arc::new(Mutex::new(spawn_runtime(10 * 1024 * 1024)));
        let mut handlers = Vec::new();
        for _ in 0..connections {
            let (stream, _) = listener.accept().unwrap();
            let runtime = Arc::clone(&runtime);
            let directory = directory.clone();
            handlers.push(thread::spawn(move || {
                handle_connection(stream, &runtime, &directory)
            }));
        }
        handlers
            .into_iter()
            .map(|handler| handler.join().unwrap())
            .collect()
    });
    (address, handle)
}

/// Plays the wrapper's side of one full invocation of the test guest.
fn run_wrapper_invocation(address: &str) -> String {
    let mut stream = TcpStream::connect(address).unwrap();
    send_message(
        &mut stream,
        &ChaincodeWrapperMessage::InvocationRequest(
            String::from("guest.wasm"),
            String::from("get_put"),
            vec![],
        ),
    )
    .unwrap();

    let message: ChaincodeProxyMessage = receive_message(&mut stream).unwrap();
    assert_eq!(
        message,
        ChaincodeProxyMessage::GetStateRequest(String::from("balance"))
    );
    send_message(
        &mut stream,
        &ChaincodeWrapperMessage::GetStateResponse(String::from("hello")),
    )
    .unwrap();

    let message: ChaincodeProxyMessage = receive_message(&mut stream).unwrap();
    assert_eq!(
        message,
        ChaincodeProxyMessage::PutStateRequest(String::from("balance"), String::from("42"))
    );
    send_message(
        &mut stream,
        &ChaincodeWrapperMessage::PutStateResponse(String::from("OK")),
    )
    .unwrap();

    match receive_message(&mut stream).unwrap() {
        ChaincodeProxyMessage::InvocationResponse(response) => response,
        otherwise => panic!("unexpected message: {:?}", otherwise),
    }
}

#[test]
fn proxy_relays_a_full_invocation() {
    let directory = deploy_guest("full-invocation");
    let (address, proxy) = spawn_proxy(directory, 1);
    assert_eq!(run_wrapper_invocation(&address), "hello");
    assert!(proxy.join().unwrap().into_iter().all(|r| r.is_ok()));
}

#[test]
fn proxy_resets_the_runtime_between_invocations() {
    let directory = deploy_guest("sequential-invocations");
    let (address, proxy) = spawn_proxy(directory, 2);
    assert_eq!(run_wrapper_invocation(&address), "hello");
    assert_eq!(run_wrapper_invocation(&address), "hello");
    assert!(proxy.join().unwrap().into_iter().all(|r| r.is_ok()));
}

#[test]
fn concurrent_invocations_are_serialized_not_refused() {
    let directory = deploy_guest("concurrent-invocations");
    let (address, proxy) = spawn_proxy(directory, 2);

    let wrappers: Vec<_> = (0..2)
        .map(|_| {
            let address = address.clone();
            thread::spawn(move || run_wrapper_invocation(&address))
        })
        .collect();
    for wrapper in wrappers {
        assert_eq!(wrapper.join().unwrap(), "hello");
    }
    assert!(proxy.join().unwrap().into_iter().all(|r| r.is_ok()));
}

#[test]
fn missing_bytecode_fails_the_connection() {
    let directory = deploy_guest("missing-bytecode");
    let (address, proxy) = spawn_proxy(directory, 1);

    let mut stream = TcpStream::connect(&address).unwrap();
    send_message(
        &mut stream,
        &ChaincodeWrapperMessage::InvocationRequest(
            String::from("no-such-contract.wasm"),
            String::from("create"),
            vec![],
        ),
    )
    .unwrap();

    // The proxy closes the connection without an invocation response.
    let reply: Result<ChaincodeProxyMessage, _> = receive_message(&mut stream);
    assert!(reply.is_err());
    match proxy.join().unwrap().remove(0) {
        Err(ProxyError::BytecodeNotFound(_)) => (),
        otherwise => panic!("unexpected result: {:?}", otherwise.map(|_| ())),
    }
}

#[test]
fn out_of_order_messages_are_a_protocol_violation() {
    let directory = deploy_guest("out-of-order");
    let (address, proxy) = spawn_proxy(directory, 1);

    let mut stream = TcpStream::connect(&address).unwrap();
    send_message(
        &mut stream,
        &ChaincodeWrapperMessage::GetStateResponse(String::from("unsolicited")),
    )
    .unwrap();

    match proxy.join().unwrap().remove(0) {
        Err(ProxyError::ProtocolViolation(_)) => (),
        otherwise => panic!("unexpected result: {:?}", otherwise.map(|_| ())),
    }
}
