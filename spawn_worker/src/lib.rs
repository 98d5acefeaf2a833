// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Spawns a worker OS process and hands back a [`tokio::process::Child`]
//! with piped stdio, the way `dispatch-core`'s worker endpoint expects.
//!
//! The worker is invoked with a fixed argv shape: a marker flag, its pool
//! index, and the service-initializer configuration it needs to bring up a
//! `ServiceRegistry` on startup. Arguments are passed as a real argv array
//! (no shell is involved), so path-like values containing spaces need no
//! quoting on our side -- unlike a shell-command string, each element here
//! is already a single OS-level argument.

use std::io;
use std::path::{Path, PathBuf};
pub use std::process::Stdio;
use tokio::process::{Child, Command};

/// The fixed command-line contract a worker binary can expect on startup.
/// See `dispatch-worker::config::WorkerArgs` for the side that parses it
/// back out.
#[derive(Debug, Clone)]
pub struct WorkerArgs {
    pub process_id: u32,
    pub service_initializer_path: PathBuf,
    pub service_initializer_class_name: Option<String>,
}

impl WorkerArgs {
    fn push_onto(&self, argv: &mut Vec<String>) {
        argv.push("--isChildProcess".into());
        argv.push("true".into());
        argv.push("--processId".into());
        argv.push(self.process_id.to_string());
        argv.push("--serviceInitializerPath".into());
        argv.push(self.service_initializer_path.display().to_string());
        if let Some(class_name) = &self.service_initializer_class_name {
            argv.push("--serviceInitializerClassName".into());
            argv.push(class_name.clone());
        }
    }
}

/// Fluent builder for spawning one worker process, mirroring the shape of
/// this crate's previous process-spawning builder: configure a target and
/// its stdio, then `spawn()`.
pub struct SpawnCfg {
    program: PathBuf,
    args: WorkerArgs,
    stdin: Stdio,
    stdout: Stdio,
    stderr: Stdio,
}

impl SpawnCfg {
    pub fn new(program: impl AsRef<Path>, args: WorkerArgs) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args,
            stdin: Stdio::piped(),
            stdout: Stdio::piped(),
            stderr: Stdio::inherit(),
        }
    }

    pub fn stdin(mut self, cfg: Stdio) -> Self {
        self.stdin = cfg;
        self
    }

    pub fn stdout(mut self, cfg: Stdio) -> Self {
        self.stdout = cfg;
        self
    }

    pub fn stderr(mut self, cfg: Stdio) -> Self {
        self.stderr = cfg;
        self
    }

    /// Renders the argv this configuration would pass to the child, without
    /// spawning it. Useful for tests and for a CLI wrapper that wants to log
    /// the exact command it is about to run.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        self.args.push_onto(&mut argv);
        argv
    }

    pub fn spawn(self) -> io::Result<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(self.argv())
            .stdin(self.stdin)
            .stdout(self.stdout)
            .stderr(self.stderr)
            .kill_on_drop(true);
        command.spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> WorkerArgs {
        WorkerArgs {
            process_id: 3,
            service_initializer_path: PathBuf::from("/tmp/my initializer.so"),
            service_initializer_class_name: Some("MyInitializer".into()),
        }
    }

    #[test]
    fn argv_carries_process_id_and_initializer_config() {
        let cfg = SpawnCfg::new("/usr/bin/worker", args());
        let argv = cfg.argv();
        assert_eq!(
            argv,
            vec![
                "--isChildProcess",
                "true",
                "--processId",
                "3",
                "--serviceInitializerPath",
                "/tmp/my initializer.so",
                "--serviceInitializerClassName",
                "MyInitializer",
            ]
        );
    }

    #[test]
    fn omits_class_name_flag_when_not_supplied() {
        let mut a = args();
        a.service_initializer_class_name = None;
        let cfg = SpawnCfg::new("/usr/bin/worker", a);
        assert!(!cfg.argv().contains(&"--serviceInitializerClassName".to_string()));
    }

    #[tokio::test]
    async fn spawns_and_passes_argv_through_to_the_child() {
        let cfg = SpawnCfg::new("/bin/echo", args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped());
        let child = cfg.spawn().unwrap();
        let output = child.wait_with_output().await.unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        assert!(stdout.contains("--processId 3"));
    }
}
