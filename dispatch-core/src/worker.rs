// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The parent's handle to one OS worker child: owns its stdin/stdout, emits
//! typed lifecycle events, and tracks the inflight task count the scheduler
//! reads.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dispatch_protocol::{FrameCodec, Payload};
use futures::{SinkExt, StreamExt};
use spawn_worker::{SpawnCfg, Stdio, WorkerArgs};
use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::DispatchError;
use crate::options::DispatcherOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Unspawned,
    Spawning,
    Ready,
    Disconnected,
    Exited,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Disconnected | WorkerState::Exited)
    }
}

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Spawn { process_id: u32 },
    Disconnect { process_id: u32 },
    DataReceive { process_id: u32, data: Payload },
    Error { process_id: u32, error: String },
    Exit { process_id: u32, exit_code: Option<i32> },
    Close { process_id: u32 },
}

impl WorkerEvent {
    pub fn process_id(&self) -> u32 {
        match self {
            WorkerEvent::Spawn { process_id }
            | WorkerEvent::Disconnect { process_id }
            | WorkerEvent::DataReceive { process_id, .. }
            | WorkerEvent::Error { process_id, .. }
            | WorkerEvent::Exit { process_id, .. }
            | WorkerEvent::Close { process_id } => *process_id,
        }
    }
}

/// The parent's handle to one worker process.
pub struct WorkerHandle {
    process_id: u32,
    state: Mutex<WorkerState>,
    task_count: AtomicU64,
    inflight: Mutex<HashSet<String>>,
    stdin: tokio::sync::Mutex<Option<FramedWrite<tokio::process::ChildStdin, FrameCodec>>>,
    events_tx: tokio::sync::mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
    /// Spawns the child process, hooks its stdout through the frame codec,
    /// and forwards every lifecycle signal to `events_tx`. Resolves once the
    /// child is observed running (the `Spawn` event is sent before this
    /// function returns).
    pub async fn spawn(
        process_id: u32,
        options: &DispatcherOptions,
        events_tx: tokio::sync::mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<WorkerHandle, DispatchError> {
        let args = WorkerArgs {
            process_id,
            service_initializer_path: options.service_initializer_path.clone(),
            service_initializer_class_name: options.service_initializer_class_name.clone(),
        };

        let mut child: Child = SpawnCfg::new(&options.worker_program, args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| DispatchError::CommunicationFailure {
                process_id,
                reason: format!("failed to spawn worker: {e}"),
            })?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let handle = WorkerHandle {
            process_id,
            state: Mutex::new(WorkerState::Spawning),
            task_count: AtomicU64::new(0),
            inflight: Mutex::new(HashSet::new()),
            stdin: tokio::sync::Mutex::new(Some(FramedWrite::new(stdin, FrameCodec::new()))),
            events_tx: events_tx.clone(),
        };

        // Reader task: decodes frames off the child's stdout and forwards
        // them as DataReceive events until the stream ends, at which point
        // we consider the worker disconnected.
        let reader_process_id = process_id;
        let reader_tx = events_tx.clone();
        tokio::spawn(async move {
            let mut framed = FramedRead::new(stdout, FrameCodec::new());
            while let Some(frame) = framed.next().await {
                match frame {
                    Ok(raw) => match Payload::from_wire(raw) {
                        Ok(payload) => {
                            let _ = reader_tx.send(WorkerEvent::DataReceive {
                                process_id: reader_process_id,
                                data: payload,
                            });
                        }
                        Err(e) => {
                            tracing::warn!(process_id = reader_process_id, error = %e, "dropping payload with malformed shape");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(process_id = reader_process_id, error = %e, "dropping malformed frame");
                    }
                }
            }
            let _ = reader_tx.send(WorkerEvent::Close {
                process_id: reader_process_id,
            });
        });

        // Exit watcher task.
        let exit_process_id = process_id;
        let exit_tx = events_tx.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let _ = exit_tx.send(WorkerEvent::Exit {
                        process_id: exit_process_id,
                        exit_code: status.code(),
                    });
                }
                Err(e) => {
                    let _ = exit_tx.send(WorkerEvent::Error {
                        process_id: exit_process_id,
                        error: e.to_string(),
                    });
                }
            }
        });

        *handle.state.lock().unwrap() = WorkerState::Ready;
        let _ = events_tx.send(WorkerEvent::Spawn { process_id });

        Ok(handle)
    }

    /// Builds a handle with no backing process, for scheduler unit tests
    /// that only need `state`/`task_count` bookkeeping.
    #[cfg(test)]
    pub(crate) fn new_for_test(process_id: u32) -> Self {
        let (events_tx, _events_rx) = tokio::sync::mpsc::unbounded_channel();
        WorkerHandle {
            process_id,
            state: Mutex::new(WorkerState::Unspawned),
            task_count: AtomicU64::new(0),
            inflight: Mutex::new(HashSet::new()),
            stdin: tokio::sync::Mutex::new(None),
            events_tx,
        }
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap()
    }

    pub fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn task_count(&self) -> u64 {
        self.task_count.load(Ordering::SeqCst)
    }

    pub fn increment_task_count(&self, step: u64) {
        debug_assert!(step >= 1);
        self.task_count.fetch_add(step.max(1), Ordering::SeqCst);
    }

    /// Clamps at zero: never goes negative.
    pub fn decrement_task_count(&self, step: u64) {
        let step = step.max(1);
        let _ = self
            .task_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_sub(step))
            });
    }

    pub fn track_inflight(&self, payload_id: String) {
        self.inflight.lock().unwrap().insert(payload_id);
    }

    pub fn untrack_inflight(&self, payload_id: &str) {
        self.inflight.lock().unwrap().remove(payload_id);
    }

    /// Drains and returns every payload id still routed through this
    /// worker, for rejection when the worker transitions to a terminal
    /// state.
    pub fn drain_inflight(&self) -> Vec<String> {
        self.inflight.lock().unwrap().drain().collect()
    }

    /// Serialises and writes a framed payload to the child's stdin.
    /// Returns `false` (never blocking on a response) if the write was
    /// rejected -- the worker is then considered disconnected.
    pub async fn send(&self, payload: Payload) -> bool {
        let mut guard = self.stdin.lock().await;
        let Some(sink) = guard.as_mut() else {
            return false;
        };
        let wire = payload.into_wire();
        if sink.send(wire).await.is_err() || sink.get_mut().flush().await.is_err() {
            *guard = None;
            self.set_state(WorkerState::Disconnected);
            let _ = self.events_tx.send(WorkerEvent::Disconnect {
                process_id: self.process_id,
            });
            return false;
        }
        true
    }
}
