// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The worker-side request loop. Reads framed `Dispatch` requests from
//! stdin, lazily and idempotently initializes the service registry,
//! resolves and invokes the requested method, and writes the result (or a
//! sanitised error) back to stdout as a framed response.

use std::sync::Arc;

use dispatch_protocol::{
    DispatchRequest, DispatchResponse, ErrorPayload, FrameCodec, LogPayload, Payload,
};
use futures::{SinkExt, StreamExt};
use tokio::io::{Stdin, Stdout};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::WorkerLoopError;
use crate::registry::{ServiceInitializer, ServiceRegistry};

/// Initialization is idempotent and lazy: it runs at most once, and a
/// failed attempt resets back to `Uninitialized` so a later request can
/// retry rather than wedging the worker forever.
enum InitState {
    Uninitialized,
    Initialized,
}

pub struct WorkerLoop<I: ServiceInitializer> {
    process_id: u32,
    initializer: I,
    registry: Mutex<ServiceRegistry>,
    init_state: Mutex<InitState>,
}

impl<I: ServiceInitializer> WorkerLoop<I> {
    pub fn new(process_id: u32, initializer: I) -> Self {
        Self {
            process_id,
            initializer,
            registry: Mutex::new(ServiceRegistry::new()),
            init_state: Mutex::new(InitState::Uninitialized),
        }
    }

    async fn ensure_initialized(&self) -> Result<(), WorkerLoopError> {
        let mut state = self.init_state.lock().await;
        if matches!(*state, InitState::Initialized) {
            return Ok(());
        }
        let mut registry = self.registry.lock().await;
        match self.initializer.initialize(&mut registry).await {
            Ok(()) => {
                *state = InitState::Initialized;
                Ok(())
            }
            Err(message) => {
                // Left as Uninitialized: a later request gets to retry.
                Err(WorkerLoopError::InitializerFailure(message))
            }
        }
    }

    async fn handle_request(&self, request: DispatchRequest) -> Payload {
        if let Err(e) = self.ensure_initialized().await {
            return Payload::Error(ErrorPayload {
                payload_id: Some(request.payload_id),
                process_id: self.process_id,
                message: e.to_string(),
                stack: None,
            });
        }

        let service = {
            let registry = self.registry.lock().await;
            registry.get_by_name(&request.service_name, request.service_scope_name.as_deref())
        };

        let Some(service) = service else {
            return Payload::Error(ErrorPayload {
                payload_id: Some(request.payload_id),
                process_id: self.process_id,
                message: WorkerLoopError::ServiceNotRegistered {
                    service_name: request.service_name,
                    service_scope_name: request.service_scope_name,
                }
                .to_string(),
                stack: None,
            });
        };

        match service.invoke(&request.method_name, request.method_arguments).await {
            Ok(result) => Payload::DispatchResponse(DispatchResponse {
                payload_id: request.payload_id,
                process_id: self.process_id,
                result,
            }),
            Err(None) => Payload::Error(ErrorPayload {
                payload_id: Some(request.payload_id),
                process_id: self.process_id,
                message: WorkerLoopError::MethodNotFound {
                    service_name: request.service_name,
                    method_name: request.method_name,
                }
                .to_string(),
                stack: None,
            }),
            Err(Some(invocation_error)) => Payload::Error(ErrorPayload {
                payload_id: Some(request.payload_id),
                process_id: self.process_id,
                message: invocation_error.message,
                stack: invocation_error.stack,
            }),
        }
    }

    /// Runs the loop to completion: reads every framed request off `stdin`,
    /// processes them **serially** (one at a time, preserving same-worker
    /// request order), and writes each response to `stdout` before reading
    /// the next request. `log_rx` carries redirected log output
    /// (see `log::IpcLogLayer`); it is drained on a best-effort basis
    /// between requests so log frames never split a response frame.
    pub async fn run(
        self: Arc<Self>,
        stdin: Stdin,
        stdout: Stdout,
        mut log_rx: tokio::sync::mpsc::UnboundedReceiver<LogPayload>,
    ) -> Result<(), WorkerLoopError> {
        let mut reader = FramedRead::new(stdin, FrameCodec::new());
        let writer = Arc::new(Mutex::new(FramedWrite::new(stdout, FrameCodec::new())));

        loop {
            tokio::select! {
                biased;
                log = log_rx.recv() => {
                    match log {
                        Some(payload) => {
                            let mut w = writer.lock().await;
                            let _ = w.send(Payload::Log(payload)).await;
                        }
                        None => {}
                    }
                }
                frame = reader.next() => {
                    let Some(frame) = frame else {
                        return Ok(());
                    };
                    let raw = match frame {
                        Ok(raw) => raw,
                        Err(e) => {
                            tracing::warn!(process_id = self.process_id, error = %e, "dropping malformed frame");
                            continue;
                        }
                    };
                    let payload = match Payload::from_wire(raw) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(process_id = self.process_id, error = %e, "dropping payload with malformed shape");
                            continue;
                        }
                    };
                    let Payload::Dispatch(request) = payload else {
                        tracing::debug!(process_id = self.process_id, "ignoring non-dispatch payload on stdin");
                        continue;
                    };

                    let response = self.handle_request(request).await;
                    let mut w = writer.lock().await;
                    if w.send(response).await.is_err() {
                        return Err(WorkerLoopError::Io("failed to write response to stdout".into()));
                    }
                }
            }
        }
    }
}
