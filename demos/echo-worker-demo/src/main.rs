// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A concrete worker binary used by the dispatcher's end-to-end tests and
//! as a runnable example of `dispatch-worker`'s traits. Registers two
//! services: `Echo.echo(x) -> x`, `Sleep.sleep(ms)`, plus a `Sleep.boom()`
//! that always fails, exercising the `RemoteInvocationFailure` path.

use std::sync::Arc;

use async_trait::async_trait;
use dispatch_worker::{
    IpcLogLayer, Service, ServiceInitializer, ServiceInvocationError, ServiceRegistry, WorkerConfig,
    WorkerLoop,
};
use tracing_subscriber::prelude::*;

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

struct Sleep;

#[async_trait]
impl Service for Sleep {
    async fn invoke(
        &self,
        method_name: &str,
        arguments: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, Option<ServiceInvocationError>> {
        match method_name {
            "sleep" => {
                let millis = arguments
                    .first()
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0);
                tracing::info!(millis, "sleeping");
                tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
                Ok(serde_json::Value::Null)
            }
            "boom" => Err(Some(ServiceInvocationError::with_stack(
                "boom",
                "at Sleep.boom (echo-worker-demo/src/main.rs)",
            ))),
            _ => Err(None),
        }
    }
}

struct DemoInitializer;

#[async_trait]
impl ServiceInitializer for DemoInitializer {
    async fn initialize(&self, registry: &mut ServiceRegistry) -> Result<(), String> {
        registry.register("Echo", None, Arc::new(Echo));
        registry.register("Sleep", None, Arc::new(Sleep));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = WorkerConfig::parse_from_args(std::env::args())?;

    let (log_tx, log_rx) = tokio::sync::mpsc::unbounded_channel();
    let subscriber = tracing_subscriber::registry()
        .with(IpcLogLayer::new(config.process_id, log_tx))
        .with(tracing_subscriber::EnvFilter::from_default_env());
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(
        process_id = config.process_id,
        service_initializer_path = %config.service_initializer_path.display(),
        "echo-worker-demo starting"
    );

    let worker_loop = Arc::new(WorkerLoop::new(config.process_id, DemoInitializer));
    worker_loop
        .run(tokio::io::stdin(), tokio::io::stdout(), log_rx)
        .await?;
    Ok(())
}
