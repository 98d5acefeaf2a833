// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parses the fixed argv contract `spawn_worker::WorkerArgs` puts on the
//! command line back into a configuration struct: the worker side re-parses
//! the command-line arguments the parent populated into a plain
//! configuration object.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "dispatch-worker", disable_help_flag = true)]
pub struct WorkerConfig {
    /// Always `true` when spawned by the dispatcher; distinguishes a worker
    /// invocation from running the binary standalone.
    #[arg(long = "isChildProcess", action = clap::ArgAction::Set, default_value_t = false)]
    pub is_child_process: bool,

    /// This worker's stable index in `[0, processCount)`.
    #[arg(long = "processId")]
    pub process_id: u32,

    /// Filesystem path to the user-supplied service initializer. Kept as an
    /// opaque passthrough value: this crate's `ServiceInitializer` is
    /// injected at compile time instead of loaded dynamically, so the path
    /// is surfaced for logging/diagnostics only and not dereferenced by the
    /// worker loop itself.
    #[arg(long = "serviceInitializerPath")]
    pub service_initializer_path: PathBuf,

    /// Optional named export selector, same passthrough treatment.
    #[arg(long = "serviceInitializerClassName")]
    pub service_initializer_class_name: Option<String>,
}

impl WorkerConfig {
    pub fn parse_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        WorkerConfig::try_parse_from(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_argv_contract_the_parent_emits() {
        let cfg = WorkerConfig::parse_from_args([
            "dispatch-worker",
            "--isChildProcess",
            "true",
            "--processId",
            "2",
            "--serviceInitializerPath",
            "/tmp/my initializer.so",
            "--serviceInitializerClassName",
            "MyInitializer",
        ])
        .unwrap();
        assert!(cfg.is_child_process);
        assert_eq!(cfg.process_id, 2);
        assert_eq!(cfg.service_initializer_path, PathBuf::from("/tmp/my initializer.so"));
        assert_eq!(cfg.service_initializer_class_name.as_deref(), Some("MyInitializer"));
    }

    #[test]
    fn class_name_is_optional() {
        let cfg = WorkerConfig::parse_from_args([
            "dispatch-worker",
            "--isChildProcess",
            "true",
            "--processId",
            "0",
            "--serviceInitializerPath",
            "/tmp/init.so",
        ])
        .unwrap();
        assert!(cfg.service_initializer_class_name.is_none());
    }
}
