//! The relay loop: accepts wrapper connections and trampolines each
//! invocation through the trusted runtime.
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
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{error, info};

use chaincode_protocol::{
    receive_message, send_message, Acknowledgement, Arguments, ChaincodeProxyMessage,
    ChaincodeWrapperMessage, InvocationResponse, KeyValue, RecordTag, TransportBuffer,
};

use crate::error::ProxyError;
use crate::worker::{spawn_runtime, RuntimeClient};

/// Binds `address` and serves wrapper connections forever.  All
/// connections funnel into one runtime worker; its client handle sits
/// behind a mutex held for a whole invocation, so concurrent invocations
/// queue rather than interleave.
pub fn serve(
    address: &str,
    chaincode_directory: &Path,
    heap_size: u32,
) -> Result<(), ProxyError> {
    let listener = TcpListener::bind(address)?;
    info!(
        "Chaincode proxy listening on {}, serving bytecode from {:?}.",
        address, chaincode_directory
    );

    let runtime = Arc::new(Mutex::new(spawn_runtime(heap_size)));
    let directory = Arc::new(chaincode_directory.to_path_buf());

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let runtime = Arc::clone(&runtime);
                let directory = Arc::clone(&directory);
                thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &runtime, &directory) {
                        error!("Connection failed: {}.", err);
                    }
                });
            }
            Err(err) => error!("Accepting a connection failed: {}.", err),
        }
    }
    Ok(())
}

/// Serves one wrapper connection: one invocation request, any number of
/// relayed state requests, one invocation response.  The runtime is reset
/// before the lock is released, whatever the outcome, so no invocation ever
/// observes its predecessor's state.
pub fn handle_connection(
    mut stream: TcpStream,
    runtime: &Mutex<RuntimeClient>,
    chaincode_directory: &Path,
) -> Result<(), ProxyError> {
    let message: ChaincodeWrapperMessage = receive_message(&mut stream)?;
    let (file, function, arguments) = match message {
        ChaincodeWrapperMessage::InvocationRequest(file, function, arguments) => {
            (file, function, arguments)
        }
        otherwise => {
            return Err(ProxyError::ProtocolViolation(format!(
                "expected an invocation request, received {:?}",
                otherwise
            )))
        }
    };
    info!("Received an invocation of {:?} from {:?}.", function, file);

    let bytecode = load_bytecode(chaincode_directory, &file)?;
    let mut client = runtime.lock().map_err(|_| ProxyError::LockPoisoned)?;
    let result = serve_invocation(&mut stream, &mut client, &bytecode, &function, &arguments);

    match client.finish() {
        Ok(output) => {
            if !output.is_empty() {
                info!("Guest output:\n{}", String::from_utf8_lossy(&output));
            }
        }
        Err(err) => error!("Resetting the runtime failed: {}.", err),
    }
    result
}

/// Reads the requested bytecode file from the chaincode directory.  The
/// file is re-read for every invocation so freshly deployed contracts are
/// picked up without a proxy restart.
fn load_bytecode(directory: &Path, file: &str) -> Result<Vec<u8>, ProxyError> {
    let path: PathBuf = directory.join(file);
    fs::read(&path).map_err(|_| ProxyError::BytecodeNotFound(path.display().to_string()))
}

/// Trampolines one invocation: runs the bytecode and relays records back
/// and forth until the runtime produces the invocation response.
fn serve_invocation(
    stream: &mut TcpStream,
    client: &mut RuntimeClient,
    bytecode: &[u8],
    function: &str,
    arguments: &[String],
) -> Result<(), ProxyError> {
    let mut buffer = TransportBuffer::new();
    Arguments::new(function, arguments).write_to(&mut buffer);
    let mut tag = client.run_wasm(bytecode, &mut buffer)?;

    loop {
        match tag {
            RecordTag::InvocationResponse => {
                let response =
                    InvocationResponse::read_from(&buffer).execution_response_string();
                info!("Invocation finished with response {:?}.", response);
                send_message(
                    &mut *stream,
                    &ChaincodeProxyMessage::InvocationResponse(response),
                )?;
                return Ok(());
            }
            RecordTag::GetStateRequest => {
                let key = KeyValue::read_from(&buffer).key_string();
                info!("Relaying a get-state request for key {:?}.", key);
                send_message(&mut *stream, &ChaincodeProxyMessage::GetStateRequest(key))?;
                let value = match receive_message(&mut *stream)? {
                    ChaincodeWrapperMessage::GetStateResponse(value) => value,
                    otherwise => {
                        return Err(ProxyError::ProtocolViolation(format!(
                            "expected a get-state response, received {:?}",
                            otherwise
                        )))
                    }
                };
                KeyValue::from_value(value.as_bytes()).write_to(&mut buffer);
                tag = client.resume_wasm(&mut buffer)?;
            }
            RecordTag::PutStateRequest => {
                let record = KeyValue::read_from(&buffer);
                info!(
                    "Relaying a put-state request for key {:?}.",
                    record.key_string()
                );
                send_message(
                    &mut *stream,
                    &ChaincodeProxyMessage::PutStateRequest(
                        record.key_string(),
                        record.value_string(),
                    ),
                )?;
                let acknowledgement = match receive_message(&mut *stream)? {
                    ChaincodeWrapperMessage::PutStateResponse(acknowledgement) => acknowledgement,
                    otherwise => {
                        return Err(ProxyError::ProtocolViolation(format!(
                            "expected a put-state response, received {:?}",
                            otherwise
                        )))
                    }
                };
                Acknowledgement::new(acknowledgement.as_bytes()).write_to(&mut buffer);
                tag = client.resume_wasm(&mut buffer)?;
            }
        }
    }
}
