// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parent-side control plane for the multi-process RPC dispatcher: worker
//! lifecycle, the pending queue, the correlation registry, and the public
//! `dispatch` call and service-proxy factory. The wire contract lives in
//! `dispatch-protocol`; spawning the OS child itself lives in
//! `spawn_worker`.

mod correlation;
mod dispatcher;
mod error;
mod options;
mod proxy;
mod queue;
mod scheduler;
mod uid;
mod worker;

pub use dispatcher::{DispatchTask, Dispatcher};
pub use error::{DispatchError, DispatcherError};
pub use options::DispatcherOptions;
pub use proxy::ServiceProxy;
pub use worker::{WorkerEvent, WorkerHandle, WorkerState};
