// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Failure taxonomy on the worker side: registration failures
/// (`ServiceNotRegistered`, `InitializerFailure`) and the method-invocation
/// failure a registered service reports.
#[derive(Debug, thiserror::Error, Clone)]
pub enum WorkerLoopError {
    #[error("worker failed to initialize: {0}")]
    InitializerFailure(String),

    #[error("no service registered under name {service_name:?} (scope {service_scope_name:?})")]
    ServiceNotRegistered {
        service_name: String,
        service_scope_name: Option<String>,
    },

    #[error("requested method '{method_name}' does not belong to service '{service_name}'")]
    MethodNotFound {
        service_name: String,
        method_name: String,
    },

    #[error("{0}")]
    Io(String),
}

/// What a `Service::invoke` implementation returns on failure. Sanitised
/// (message + stack only, no live references) before crossing the wire.
#[derive(Debug, Clone)]
pub struct ServiceInvocationError {
    pub message: String,
    pub stack: Option<String>,
}

impl ServiceInvocationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Some(stack.into()),
        }
    }
}

impl std::fmt::Display for ServiceInvocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ServiceInvocationError {}
