// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The worker-side request loop. Parses the argv contract the parent spawns
//! a worker with, lazily initializes a service registry from a compile-
//! time-injected `ServiceInitializer`, resolves and invokes requested
//! methods, and redirects the worker's `tracing` output to the parent as
//! framed `Log` payloads.

mod config;
mod error;
mod log;
mod registry;
mod worker_loop;

pub use config::WorkerConfig;
pub use error::{ServiceInvocationError, WorkerLoopError};
pub use log::IpcLogLayer;
pub use registry::{Service, ServiceInitializer, ServiceRegistry};
pub use worker_loop::WorkerLoop;
