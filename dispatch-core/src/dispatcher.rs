// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Owns the worker pool, chooses a worker per request, submits through the
//! pending queue, routes responses from a worker's `DataReceive` events via
//! the correlation registry, and implements the public `dispatch` call and
//! the dynamic service-proxy factory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dispatch_protocol::{DispatchRequest, Payload};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::correlation::CorrelationRegistry;
use crate::error::{DispatchError, DispatcherError};
use crate::options::DispatcherOptions;
use crate::queue::PendingQueue;
use crate::scheduler::select_least_busy;
use crate::uid::UidGenerator;
use crate::worker::{WorkerEvent, WorkerHandle, WorkerState};

const DRAIN_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Started,
    Stopped,
}

/// One RPC invocation a caller wants performed in some worker process.
#[derive(Debug, Clone)]
pub struct DispatchTask {
    pub service_name: String,
    pub service_scope_name: Option<String>,
    pub method_name: String,
    pub method_arguments: Vec<serde_json::Value>,
}

impl DispatchTask {
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_scope_name: None,
            method_name: method_name.into(),
            method_arguments: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.service_scope_name = Some(scope.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<serde_json::Value>) -> Self {
        self.method_arguments = arguments;
        self
    }
}

/// Process-wide (per instance) RPC dispatcher: owns a fixed-size pool of
/// worker child processes and routes `dispatch` calls to whichever worker
/// is currently least busy.
pub struct Dispatcher {
    options: DispatcherOptions,
    phase: RwLock<Phase>,
    start_lock: AsyncMutex<()>,
    workers: RwLock<Vec<Arc<WorkerHandle>>>,
    pending: Arc<PendingQueue>,
    correlation: Arc<CorrelationRegistry>,
    uid: UidGenerator,
    drainer: AsyncMutex<Option<JoinHandle<()>>>,
    router: AsyncMutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
}

impl Dispatcher {
    /// Constructs a dispatcher from already-validated options. Does not
    /// spawn any worker; call `start` for that.
    pub fn create_instance(options: DispatcherOptions) -> Result<Arc<Dispatcher>, DispatchError> {
        let options = options.validate()?;
        let capacity = options.pending_queue_capacity();
        Ok(Arc::new(Dispatcher {
            options,
            phase: RwLock::new(Phase::Idle),
            start_lock: AsyncMutex::new(()),
            workers: RwLock::new(Vec::new()),
            pending: Arc::new(PendingQueue::new(capacity)),
            correlation: Arc::new(CorrelationRegistry::new()),
            uid: UidGenerator::new(),
            drainer: AsyncMutex::new(None),
            router: AsyncMutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }))
    }

    pub fn process_count(&self) -> u32 {
        self.options.process_count
    }

    pub fn options(&self) -> &DispatcherOptions {
        &self.options
    }

    pub fn is_started(&self) -> bool {
        *self.phase.read().unwrap() == Phase::Started
    }

    fn phase(&self) -> Phase {
        *self.phase.read().unwrap()
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.write().unwrap() = phase;
    }

    /// Spawns `process_count` workers and starts the queue drainer. A no-op
    /// if already `Starting` or `Started`; concurrent callers serialize on
    /// `start_lock` and observe the same outcome.
    pub async fn start(self: &Arc<Self>) -> Result<(), DispatchError> {
        let _guard = self.start_lock.lock().await;
        if self.phase() != Phase::Idle {
            return Ok(());
        }
        self.set_phase(Phase::Starting);

        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel::<WorkerEvent>();
        let spawns = (0..self.options.process_count).map(|i| {
            let options = &self.options;
            let tx = events_tx.clone();
            WorkerHandle::spawn(i, options, tx)
        });

        let spawned = match futures::future::try_join_all(spawns).await {
            Ok(workers) => workers,
            Err(e) => {
                self.set_phase(Phase::Idle);
                return Err(e);
            }
        };

        *self.workers.write().unwrap() = spawned.into_iter().map(Arc::new).collect();
        self.running.store(true, Ordering::SeqCst);

        let router = tokio::spawn(Self::route_events(
            Arc::clone(self),
            events_rx,
        ));
        *self.router.lock().await = Some(router);

        let drainer = tokio::spawn(Self::drain_loop(Arc::clone(self)));
        *self.drainer.lock().await = Some(drainer);

        self.set_phase(Phase::Started);
        Ok(())
    }

    /// Stops accepting new requests. In-flight requests already handed to a
    /// worker are allowed to complete; the drainer notices `running` is
    /// false on its next tick and exits.
    pub fn stop(&self) {
        self.set_phase(Phase::Stopped);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Invokes `task.method_name` on `task.service_name` in whichever worker
    /// is currently least busy.
    pub async fn dispatch(&self, task: DispatchTask) -> Result<serde_json::Value, DispatchError> {
        if self.phase() != Phase::Started {
            return Err(DispatchError::NotStarted);
        }
        if task.service_name.trim().is_empty() {
            return Err(DispatchError::InvalidService);
        }
        let method_name = task.method_name.trim().to_string();
        if method_name.is_empty() {
            return Err(DispatchError::InvalidMethod(task.method_name));
        }

        let payload_id = self.uid.next();
        let rx = self.correlation.register(payload_id.clone());

        let request = DispatchRequest {
            payload_id: payload_id.clone(),
            process_id: 0,
            service_name: task.service_name,
            service_scope_name: task.service_scope_name,
            method_name,
            method_arguments: task.method_arguments,
        };
        if let Err(e) = self.pending.push(request) {
            self.correlation.cancel(&payload_id);
            return Err(e);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::CommunicationFailure {
                process_id: 0,
                reason: "waiter dropped before a response arrived".into(),
            }),
        }
    }

    /// Returns a dynamic service proxy bound to `service_name` (and
    /// optionally `scope_name`): every call through it forwards to
    /// `dispatch` with the call's method name and arguments. See
    /// [`crate::proxy::ServiceProxy`].
    pub fn get(self: &Arc<Self>, service_name: impl Into<String>, scope_name: Option<String>) -> crate::proxy::ServiceProxy {
        crate::proxy::ServiceProxy::new(Arc::clone(self), service_name.into(), scope_name)
    }

    /// Periodic drainer: pulls one request at a time, picks the least-busy
    /// ready worker, and writes it. Ticks at `DRAIN_INTERVAL` (~5ms); exits
    /// once `running` goes false.
    async fn drain_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(DRAIN_INTERVAL);
        loop {
            interval.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            self.drain_one().await;
        }
    }

    async fn drain_one(&self) {
        let Some(request) = self.pending.pop_front() else {
            return;
        };

        let worker = {
            let workers = self.workers.read().unwrap();
            select_least_busy(&workers).map(|i| Arc::clone(&workers[i]))
        };

        let Some(worker) = worker else {
            // No ready worker right now; leave the request enqueued for the
            // next tick.
            self.pending.push_front(request);
            return;
        };

        let payload_id = request.payload_id.clone();
        let process_id = worker.process_id();
        worker.increment_task_count(1);
        worker.track_inflight(payload_id.clone());

        let mut request = request;
        request.process_id = process_id;
        let sent = worker.send(Payload::Dispatch(request)).await;
        if !sent {
            worker.untrack_inflight(&payload_id);
            worker.decrement_task_count(1);
            self.correlation.resolve(
                &payload_id,
                Err(DispatchError::CommunicationFailure {
                    process_id,
                    reason: "write to worker stdin was rejected".into(),
                }),
            );
        }
    }

    /// Subscribes to every worker's lifecycle/data events for the lifetime
    /// of the dispatcher, routing each to the correlation registry or the
    /// logger.
    async fn route_events(self: Arc<Self>, mut events_rx: tokio::sync::mpsc::UnboundedReceiver<WorkerEvent>) {
        while let Some(event) = events_rx.recv().await {
            self.handle_event(event);
        }
    }

    fn handle_event(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Spawn { .. } => {}
            WorkerEvent::DataReceive { process_id, data } => self.handle_payload(process_id, data),
            WorkerEvent::Disconnect { process_id } => {
                self.mark_terminal(process_id, WorkerState::Disconnected, "worker disconnected");
            }
            WorkerEvent::Exit { process_id, exit_code } => {
                tracing::warn!(process_id, exit_code, "worker exited");
                self.mark_terminal(process_id, WorkerState::Exited, "worker exited");
            }
            WorkerEvent::Close { process_id } => {
                tracing::debug!(process_id, "worker stdout stream closed");
                self.mark_terminal(process_id, WorkerState::Exited, "worker stdout closed");
            }
            WorkerEvent::Error { process_id, error } => {
                tracing::error!(process_id, error = %error, "worker reported an error");
            }
        }
    }

    fn handle_payload(&self, process_id: u32, payload: Payload) {
        match payload {
            Payload::Log(log) => {
                let level = log.log_level;
                let params = log
                    .log_parameters
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                match level {
                    dispatch_protocol::LogLevel::Trace => tracing::trace!(process_id, "{params}"),
                    dispatch_protocol::LogLevel::Debug => tracing::debug!(process_id, "{params}"),
                    dispatch_protocol::LogLevel::Info => tracing::info!(process_id, "{params}"),
                    dispatch_protocol::LogLevel::Warn => tracing::warn!(process_id, "{params}"),
                    dispatch_protocol::LogLevel::Error => tracing::error!(process_id, "{params}"),
                }
            }
            Payload::DispatchResponse(resp) => {
                self.complete_request(process_id, &resp.payload_id, Ok(resp.result));
            }
            Payload::Error(err) => match err.payload_id {
                Some(payload_id) => {
                    self.complete_request(
                        process_id,
                        &payload_id,
                        Err(DispatchError::RemoteInvocationFailure(DispatcherError {
                            message: err.message,
                            stack: err.stack,
                        })),
                    );
                }
                None => {
                    tracing::error!(process_id, message = %err.message, "worker reported a standalone error");
                }
            },
            Payload::Available(_) => {
                // Reserved for the round-robin + busy-bit scheduler variant
                // this crate does not implement; least-busy selection never
                // needs it.
            }
            Payload::Dispatch(_) => {
                tracing::warn!(process_id, "parent received a dispatch request shaped payload, dropping");
            }
        }
    }

    fn complete_request(&self, process_id: u32, payload_id: &str, result: Result<serde_json::Value, DispatchError>) {
        let workers = self.workers.read().unwrap();
        if let Some(worker) = workers.iter().find(|w| w.process_id() == process_id) {
            worker.untrack_inflight(payload_id);
            worker.decrement_task_count(1);
        }
        drop(workers);
        if !self.correlation.resolve(payload_id, result) {
            tracing::debug!(process_id, payload_id, "dropping late or duplicate response");
        }
    }

    fn mark_terminal(&self, process_id: u32, state: WorkerState, reason: &str) {
        let workers = self.workers.read().unwrap();
        if let Some(worker) = workers.iter().find(|w| w.process_id() == process_id) {
            worker.set_state(state);
            let inflight = worker.drain_inflight();
            drop(workers);
            self.correlation.reject_many(
                &inflight,
                DispatchError::CommunicationFailure {
                    process_id,
                    reason: reason.to_string(),
                },
            );
        }
    }
}
