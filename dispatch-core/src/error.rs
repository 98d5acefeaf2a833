// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The error taxonomy a caller of `dispatch` can observe, plus the
//! `DispatcherError` wrapper that preserves a remote worker's message and
//! stack verbatim.

/// Errors surfaced to a `dispatch` caller. `FrameDecode` never reaches this
/// type in practice -- malformed frames are recovered locally by the reader
/// -- but it is kept in the taxonomy because the core logs it through the
/// same reporting path as the others.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("dispatcher is not started")]
    NotStarted,

    #[error("task does not carry a valid service reference")]
    InvalidService,

    #[error("method name is blank or invalid: {0:?}")]
    InvalidMethod(String),

    #[error("no service registered under name {service_name:?} (scope {service_scope_name:?})")]
    ServiceNotRegistered {
        service_name: String,
        service_scope_name: Option<String>,
    },

    #[error("failed to communicate with worker {process_id}: {reason}")]
    CommunicationFailure { process_id: u32, reason: String },

    #[error("{0}")]
    RemoteInvocationFailure(#[from] DispatcherError),

    #[error("failed to decode an IPC frame: {0}")]
    FrameDecode(String),

    #[error("worker {process_id} failed to initialize: {message}")]
    InitializerFailure { process_id: u32, message: String },

    #[error("the pending queue is at capacity ({capacity})")]
    QueueFull { capacity: usize },
}

/// Carries a remote worker's failure verbatim: the `message` and (if the
/// worker could produce one) the original `stack`. Constructed from an
/// `Error` IPC payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherError {
    pub message: String,
    pub stack: Option<String>,
}

impl std::fmt::Display for DispatcherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DispatcherError {}
