//! The runtime worker thread.
//!
//! The trusted runtime holds reference-counted interpreter state that is
//! pinned to one thread, so it cannot be shared across connection handlers
//! directly.  Instead the runtime lives on a dedicated worker thread and
//! handlers drive it through a command channel, each command carrying its
//! own reply channel.  The worker processes one command at a time, which
//! also keeps every runtime interaction strictly sequential.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use std::sync::mpsc;
use std::thread;

use log::info;

use chaincode_engine::{EngineError, TrustedRuntime};
use chaincode_protocol::{RecordTag, TransportBuffer};

use crate::error::ProxyError;

/// One command for the runtime worker.
enum RuntimeCommand {
    /// Start an invocation of the carried bytecode.  The buffer holds the
    /// arguments record.
    Run {
        bytecode: Vec<u8>,
        buffer: TransportBuffer,
        reply: mpsc::Sender<StepReply>,
    },
    /// Resume the suspended invocation.  The buffer holds the record
    /// answering the pending request.
    Resume {
        buffer: TransportBuffer,
        reply: mpsc::Sender<StepReply>,
    },
    /// End the invocation: reset the runtime and hand back the output the
    /// guest logged.
    Finish { reply: mpsc::Sender<Vec<u8>> },
}

/// The worker's answer to a run or resume command: the step result and the
/// transport buffer as the step left it.
struct StepReply {
    result: Result<RecordTag, EngineError>,
    buffer: TransportBuffer,
}

/// A handle submitting commands to the runtime worker.  The handle does
/// not serialize whole invocations by itself; a caller must hold it
/// exclusively from `run_wasm` until `finish` (the relay keeps it behind a
/// mutex for exactly that).
pub struct RuntimeClient {
    commands: mpsc::Sender<RuntimeCommand>,
}

/// Spawns the runtime worker and returns the client handle for it.  The
/// worker exits once every client handle is dropped.
pub fn spawn_runtime(heap_size: u32) -> RuntimeClient {
    let (commands, inbox) = mpsc::channel();
    thread::spawn(move || {
        let mut runtime = TrustedRuntime::new();
        runtime.configure_heap(heap_size);
        info!("Runtime worker started.");
        for command in inbox {
            match command {
                RuntimeCommand::Run {
                    bytecode,
                    mut buffer,
                    reply,
                } => {
                    let result = runtime.run_wasm(&bytecode, &mut buffer);
                    let _ = reply.send(StepReply { result, buffer });
                }
                RuntimeCommand::Resume { mut buffer, reply } => {
                    let result = runtime.resume_wasm(&mut buffer);
                    let _ = reply.send(StepReply { result, buffer });
                }
                RuntimeCommand::Finish { reply } => {
                    let output = runtime.take_captured_output();
                    runtime.restart();
                    let _ = reply.send(output);
                }
            }
        }
        info!("Runtime worker exiting.");
    });
    RuntimeClient { commands }
}

impl RuntimeClient {
    /// Starts an invocation on the worker.  Same contract as the runtime's
    /// own `run_wasm`: the buffer holds the arguments record on entry and
    /// the produced record on return.
    pub fn run_wasm(
        &mut self,
        bytecode: &[u8],
        buffer: &mut TransportBuffer,
    ) -> Result<RecordTag, ProxyError> {
        let (reply, answer) = mpsc::channel();
        self.commands
            .send(RuntimeCommand::Run {
                bytecode: bytecode.to_vec(),
                buffer: buffer.clone(),
                reply,
            })
            .map_err(|_| ProxyError::RuntimeUnavailable)?;
        Self::collect(&answer, buffer)
    }

    /// Resumes the suspended invocation on the worker.
    pub fn resume_wasm(&mut self, buffer: &mut TransportBuffer) -> Result<RecordTag, ProxyError> {
        let (reply, answer) = mpsc::channel();
        self.commands
            .send(RuntimeCommand::Resume {
                buffer: buffer.clone(),
                reply,
            })
            .map_err(|_| ProxyError::RuntimeUnavailable)?;
        Self::collect(&answer, buffer)
    }

    /// Ends the invocation, resetting the runtime, and returns the output
    /// the guest logged.
    pub fn finish(&mut self) -> Result<Vec<u8>, ProxyError> {
        let (reply, answer) = mpsc::channel();
        self.commands
            .send(RuntimeCommand::Finish { reply })
            .map_err(|_| ProxyError::RuntimeUnavailable)?;
        answer.recv().map_err(|_| ProxyError::RuntimeUnavailable)
    }

    fn collect(
        answer: &mpsc::Receiver<StepReply>,
        buffer: &mut TransportBuffer,
    ) -> Result<RecordTag, ProxyError> {
        let step = answer.recv().map_err(|_| ProxyError::RuntimeUnavailable)?;
        *buffer = step.buffer;
        Ok(step.result?)
    }
}
