// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A CLI wrapper around `dispatch-core`. Parses pool options, starts a
//! dispatcher, dispatches exactly one call read from argv, prints the JSON
//! result to stdout, and exits with a status code (0 success; non-zero on
//! spawn/initialization failure or on the dispatch itself failing).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dispatch_core::{DispatchTask, Dispatcher, DispatcherOptions};

/// Start a worker pool, dispatch one RPC, print its JSON result.
#[derive(Parser, Debug)]
#[command(name = "dispatch-cli", version)]
struct Cli {
    /// Number of worker processes to spawn (coerced to at least 1).
    #[arg(long, default_value_t = 1)]
    process_count: u32,

    /// Path to the worker binary the dispatcher spawns once per pool slot.
    #[arg(long)]
    worker_program: PathBuf,

    /// Path to the user-supplied service initializer passed through to
    /// each worker.
    #[arg(long)]
    service_initializer: PathBuf,

    /// Optional named export selector for the service initializer.
    #[arg(long)]
    service_initializer_class_name: Option<String>,

    /// Name of the service to invoke.
    service_name: String,

    /// Method to invoke on the service.
    method_name: String,

    /// Method arguments, each parsed as a JSON value (bare strings that
    /// aren't valid JSON are passed through as JSON strings).
    arguments: Vec<String>,
}

fn parse_argument(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(result) => {
            println!("{result}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "dispatch-cli failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let options = DispatcherOptions::new(&cli.worker_program, &cli.service_initializer)
        .process_count(cli.process_count);
    let options = match cli.service_initializer_class_name {
        Some(name) => options.service_initializer_class_name(name),
        None => options,
    };

    let dispatcher = Dispatcher::create_instance(options)?;
    dispatcher.start().await?;

    let arguments = cli.arguments.iter().map(|s| parse_argument(s)).collect();
    let task = DispatchTask::new(cli.service_name, cli.method_name).with_arguments(arguments);
    let result = dispatcher.dispatch(task).await?;

    dispatcher.stop();
    Ok(serde_json::to_string_pretty(&result)?)
}
