// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// A monotonic-within-process, collision-free source of `payloadId` values.
/// Uniqueness across the lifetime of the parent is achieved by pairing a
/// per-process session id with a strictly increasing counter, rather than
/// relying on the counter alone (which would collide across dispatcher
/// restarts within the same process in tests).
pub struct UidGenerator {
    session: Uuid,
    counter: AtomicU64,
}

impl UidGenerator {
    pub fn new() -> Self {
        Self {
            session: Uuid::new_v4(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.session.simple())
    }
}

impl Default for UidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_unique_ids() {
        let gen = UidGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(gen.next()));
        }
    }
}
