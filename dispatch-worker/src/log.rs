// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log redirection: a `tracing_subscriber::Layer` that turns every event
//! emitted on the worker into a `Log` payload and forwards it to a channel
//! the worker loop drains and frames onto stdout, instead of monkey-
//! patching global I/O.

use dispatch_protocol::{LogLevel, LogPayload};
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;

fn map_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push((field.name().to_string(), format!("{value:?}")));
        }
    }
}

/// Forwards every `tracing` event on the worker to `tx` as a `LogPayload`.
/// Installed as a layer alongside (or instead of) a human-readable
/// subscriber, scoped to `process_id`.
pub struct IpcLogLayer {
    process_id: u32,
    tx: tokio::sync::mpsc::UnboundedSender<LogPayload>,
}

impl IpcLogLayer {
    pub fn new(process_id: u32, tx: tokio::sync::mpsc::UnboundedSender<LogPayload>) -> Self {
        Self { process_id, tx }
    }
}

impl<S> Layer<S> for IpcLogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut parameters = Vec::new();
        if let Some(message) = visitor.message {
            parameters.push(serde_json::Value::String(message));
        }
        for (name, value) in visitor.fields {
            parameters.push(serde_json::json!({ name: value }));
        }

        let _ = self.tx.send(LogPayload {
            process_id: self.process_id,
            log_level: map_level(event.metadata().level()),
            log_parameters: parameters,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::prelude::*;

    #[test]
    fn redirects_a_tracing_event_into_a_log_payload() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let layer = IpcLogLayer::new(3, tx);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(service = "Echo", "something happened");
        });

        let payload = rx.try_recv().unwrap();
        assert_eq!(payload.process_id, 3);
        assert_eq!(payload.log_level, LogLevel::Warn);
        assert!(!payload.log_parameters.is_empty());
    }
}
