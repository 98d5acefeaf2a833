// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The concrete service provider a worker binary plugs in is treated as an
//! external collaborator the worker loop talks to. This module defines the
//! *interface* side of that contract: a `Service` trait any invocable
//! object implements, a concrete `ServiceRegistry` a worker populates, and
//! a `ServiceInitializer` trait a worker binary supplies.
//!
//! This favors ordinary compile-time trait objects, constructor-injected
//! with explicit init/teardown, over dynamically loading a module named by
//! `serviceInitializerPath` at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceInvocationError;

/// An invocable object reachable by name from a `ServiceRegistry`. Collapses
/// `service[methodName](...args)`-style dynamic dispatch into a single
/// `invoke` entry point keyed by method name.
#[async_trait]
pub trait Service: Send + Sync {
    /// Invokes `method_name` with `arguments` in call order. Returns
    /// `Err(None)` to signal "this service has no such method" (mapped to
    /// `MethodNotFound` by the caller, which knows the service name);
    /// `Err(Some(..))` for any other failure during invocation.
    async fn invoke(
        &self,
        method_name: &str,
        arguments: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, Option<ServiceInvocationError>>;
}

/// Registers services under a `(name, scope)` key, the way a worker's
/// `ServiceInitializer` populates it on startup.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<(String, Option<String>), Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        service_name: impl Into<String>,
        service_scope_name: Option<String>,
        service: Arc<dyn Service>,
    ) {
        self.services.insert((service_name.into(), service_scope_name), service);
    }

    /// `serviceScopeName` is an opaque string passed through verbatim --
    /// its semantics depend entirely on the external provider a real
    /// deployment plugs in.
    pub fn get_by_name(&self, service_name: &str, service_scope_name: Option<&str>) -> Option<Arc<dyn Service>> {
        self.services
            .get(&(service_name.to_string(), service_scope_name.map(str::to_string)))
            .cloned()
    }
}

/// Populates a `ServiceRegistry` on worker startup. Exactly one
/// implementation is supplied per worker binary (see `echo-worker-demo`
/// for a concrete example with an `Echo` and a `Sleep` service).
#[async_trait]
pub trait ServiceInitializer: Send + Sync {
    async fn initialize(&self, registry: &mut ServiceRegistry) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Service for Echo {
        async fn invoke(
            &self,
            method_name: &str,
            arguments: Vec<serde_json::Value>,
        ) -> Result<serde_json::Value, Option<ServiceInvocationError>> {
            match method_name {
                "echo" => Ok(arguments.into_iter().next().unwrap_or(serde_json::Value::Null)),
                _ => Err(None),
            }
        }
    }

    #[tokio::test]
    async fn registers_and_resolves_by_name_and_scope() {
        let mut registry = ServiceRegistry::new();
        registry.register("Echo", None, Arc::new(Echo));
        registry.register("Echo", Some("tenant-a".into()), Arc::new(Echo));

        assert!(registry.get_by_name("Echo", None).is_some());
        assert!(registry.get_by_name("Echo", Some("tenant-a")).is_some());
        assert!(registry.get_by_name("Echo", Some("tenant-b")).is_none());
        assert!(registry.get_by_name("Unknown", None).is_none());
    }
}
