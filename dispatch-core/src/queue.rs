// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A bounded FIFO of outgoing requests awaiting a worker. The dispatcher
//! never writes to a worker's stdin directly from `dispatch`; it enqueues
//! here and a periodic drainer (see `dispatcher::spawn_drainer`) pulls one
//! payload at a time.

use std::collections::VecDeque;
use std::sync::Mutex;

use dispatch_protocol::DispatchRequest;

use crate::error::DispatchError;

/// Holds outgoing requests only -- a `Dispatch` request is the one payload
/// shape the parent ever enqueues for itself to send later. `process_id` is
/// left unset (`None`) until the drainer picks a worker; the queue doesn't
/// know which worker will serve a request until drain time.
pub struct PendingQueue {
    capacity: usize,
    items: Mutex<VecDeque<DispatchRequest>>,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
        }
    }

    /// Enqueues a request at the tail. Fails with `QueueFull` if the queue
    /// is already at capacity rather than growing unbounded.
    pub fn push(&self, request: DispatchRequest) -> Result<(), DispatchError> {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.capacity {
            return Err(DispatchError::QueueFull {
                capacity: self.capacity,
            });
        }
        items.push_back(request);
        Ok(())
    }

    /// Puts a request back at the head, used by the drainer when no worker
    /// is currently `Ready` -- the request stays enqueued for the next tick.
    pub fn push_front(&self, request: DispatchRequest) {
        self.items.lock().unwrap().push_front(request);
    }

    pub fn pop_front(&self) -> Option<DispatchRequest> {
        self.items.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> DispatchRequest {
        DispatchRequest {
            payload_id: id.into(),
            process_id: 0,
            service_name: "Echo".into(),
            service_scope_name: None,
            method_name: "echo".into(),
            method_arguments: vec![],
        }
    }

    #[test]
    fn fifo_order_is_preserved() {
        let q = PendingQueue::new(4);
        q.push(sample("a")).unwrap();
        q.push(sample("b")).unwrap();
        let first = q.pop_front().unwrap();
        assert_eq!(first.payload_id, "a");
    }

    #[test]
    fn push_front_reinserts_at_the_head() {
        let q = PendingQueue::new(4);
        q.push(sample("a")).unwrap();
        q.push(sample("b")).unwrap();
        let taken = q.pop_front().unwrap();
        q.push_front(taken);
        assert_eq!(q.pop_front().unwrap().payload_id, "a");
    }

    #[test]
    fn rejects_pushes_past_capacity() {
        let q = PendingQueue::new(1);
        q.push(sample("a")).unwrap();
        assert!(matches!(
            q.push(sample("b")),
            Err(DispatchError::QueueFull { capacity: 1 })
        ));
    }
}
