// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! An ergonomic facade over `Dispatcher::dispatch`, bound to one service
//! and optional scope: `proxy.call("foo", args)` is equivalent to
//! `dispatch({service_name, method_name: "foo", method_arguments: args})`,
//! with argument ordering preserved verbatim.

use std::sync::Arc;

use crate::dispatcher::{DispatchTask, Dispatcher};
use crate::error::DispatchError;

/// An ergonomic, typed-looking facade over `Dispatcher::dispatch` bound to
/// one service (and optional scope). Returned by [`Dispatcher::get`].
#[derive(Clone)]
pub struct ServiceProxy {
    dispatcher: Arc<Dispatcher>,
    service_name: String,
    scope_name: Option<String>,
}

impl ServiceProxy {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, service_name: String, scope_name: Option<String>) -> Self {
        Self {
            dispatcher,
            service_name,
            scope_name,
        }
    }

    /// Invokes `method_name` with `arguments`, forwarding to `dispatch` on
    /// the bound service and scope.
    pub async fn call(
        &self,
        method_name: impl Into<String>,
        arguments: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, DispatchError> {
        let mut task = DispatchTask::new(self.service_name.clone(), method_name.into()).with_arguments(arguments);
        if let Some(scope) = &self.scope_name {
            task = task.with_scope(scope.clone());
        }
        self.dispatcher.dispatch(task).await
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn scope_name(&self) -> Option<&str> {
        self.scope_name.as_deref()
    }
}
