// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Maps in-flight `payloadId`s to the one-shot waiter that will be resolved
//! (or rejected) when the matching response arrives, so each dispatch call
//! can await its own response without scanning every reply a worker sends.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::DispatchError;

pub type Waiter = oneshot::Sender<Result<serde_json::Value, DispatchError>>;

#[derive(Default)]
pub struct CorrelationRegistry {
    waiters: Mutex<HashMap<String, Waiter>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a one-shot waiter for `payload_id`, returning the receiving
    /// half the caller awaits.
    pub fn register(&self, payload_id: String) -> oneshot::Receiver<Result<serde_json::Value, DispatchError>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().unwrap().insert(payload_id, tx);
        rx
    }

    /// Removes and fulfills the waiter for `payload_id`, if still registered
    /// (it may have been dropped by a timed-out caller). Returns whether a
    /// waiter was found -- a `false` result means a late or duplicate
    /// response, which callers should log and drop.
    pub fn resolve(&self, payload_id: &str, result: Result<serde_json::Value, DispatchError>) -> bool {
        let waiter = self.waiters.lock().unwrap().remove(payload_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    /// Drops `payload_id`'s waiter without resolving it, used when a caller
    /// abandons a request (e.g. an external timeout wrapper).
    pub fn cancel(&self, payload_id: &str) {
        self.waiters.lock().unwrap().remove(payload_id);
    }

    pub fn contains(&self, payload_id: &str) -> bool {
        self.waiters.lock().unwrap().contains_key(payload_id)
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves every still-registered waiter with `err`, used when a
    /// worker transitions to a terminal state and its inflight requests are
    /// drained for rejection.
    pub fn reject_many(&self, payload_ids: &[String], err: DispatchError) {
        for id in payload_ids {
            self.resolve(id, Err(err.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_a_registered_waiter_exactly_once() {
        let registry = CorrelationRegistry::new();
        let rx = registry.register("req-1".into());
        assert!(registry.resolve("req-1", Ok(serde_json::json!(42))));
        assert!(!registry.resolve("req-1", Ok(serde_json::json!(43))));
        assert_eq!(rx.await.unwrap().unwrap(), serde_json::json!(42));
    }

    #[test]
    fn resolving_an_unknown_id_reports_not_found() {
        let registry = CorrelationRegistry::new();
        assert!(!registry.resolve("ghost", Ok(serde_json::Value::Null)));
    }

    #[tokio::test]
    async fn reject_many_rejects_every_drained_id() {
        let registry = CorrelationRegistry::new();
        let rx_a = registry.register("a".into());
        let rx_b = registry.register("b".into());
        registry.reject_many(
            &["a".to_string(), "b".to_string()],
            DispatchError::CommunicationFailure {
                process_id: 0,
                reason: "disconnected".into(),
            },
        );
        assert!(rx_a.await.unwrap().is_err());
        assert!(rx_b.await.unwrap().is_err());
    }
}
