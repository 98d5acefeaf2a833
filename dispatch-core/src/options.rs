// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Construction-time configuration for a [`crate::Dispatcher`], with
//! environment-variable overrides in the `const ENV_* : &str` style used
//! throughout this workspace's sidecar-adjacent crates.

use std::path::{Path, PathBuf};

use crate::error::DispatchError;

const ENV_PROCESS_COUNT: &str = "DISPATCH_PROCESS_COUNT";
const ENV_SERVICE_INITIALIZER_PATH: &str = "DISPATCH_SERVICE_INITIALIZER_PATH";
const ENV_SERVICE_INITIALIZER_CLASS_NAME: &str = "DISPATCH_SERVICE_INITIALIZER_CLASS_NAME";

const DEFAULT_PROCESS_COUNT: u32 = 1;
const PENDING_QUEUE_CAPACITY: usize = 4096;

/// Options a [`crate::Dispatcher`] is constructed with. `process_count` is
/// coerced to at least 1; `worker_program` is the binary the parent spawns
/// once per worker slot and `service_initializer_path` must exist at
/// construction time -- both checks fail fast.
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    pub process_count: u32,
    pub worker_program: PathBuf,
    pub service_initializer_path: PathBuf,
    pub service_initializer_class_name: Option<String>,
}

impl DispatcherOptions {
    pub fn new(worker_program: impl AsRef<Path>, service_initializer_path: impl AsRef<Path>) -> Self {
        Self {
            process_count: DEFAULT_PROCESS_COUNT,
            worker_program: worker_program.as_ref().to_path_buf(),
            service_initializer_path: service_initializer_path.as_ref().to_path_buf(),
            service_initializer_class_name: None,
        }
    }

    pub fn process_count(mut self, count: u32) -> Self {
        self.process_count = count;
        self
    }

    pub fn service_initializer_class_name(mut self, name: impl Into<String>) -> Self {
        self.service_initializer_class_name = Some(name.into());
        self
    }

    /// Overrides fields present in the environment, following the
    /// `ENV_PROCESS_COUNT` / `ENV_SERVICE_INITIALIZER_PATH` /
    /// `ENV_SERVICE_INITIALIZER_CLASS_NAME` variables.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(count) = std::env::var(ENV_PROCESS_COUNT) {
            if let Ok(parsed) = count.parse() {
                self.process_count = parsed;
            }
        }
        if let Ok(path) = std::env::var(ENV_SERVICE_INITIALIZER_PATH) {
            self.service_initializer_path = PathBuf::from(path);
        }
        if let Ok(name) = std::env::var(ENV_SERVICE_INITIALIZER_CLASS_NAME) {
            self.service_initializer_class_name = Some(name);
        }
        self
    }

    pub fn pending_queue_capacity(&self) -> usize {
        PENDING_QUEUE_CAPACITY
    }

    /// Validates the options, coercing `process_count` to at least 1 and
    /// failing fast if `service_initializer_path` does not exist.
    pub fn validate(mut self) -> Result<Self, DispatchError> {
        if self.process_count == 0 {
            self.process_count = 1;
        }
        if !self.service_initializer_path.exists() {
            return Err(DispatchError::InitializerFailure {
                process_id: 0,
                message: format!(
                    "service initializer path does not exist: {}",
                    self.service_initializer_path.display()
                ),
            });
        }
        Ok(self)
    }
}
