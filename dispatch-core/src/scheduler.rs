// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Worker selection policy: **least-busy** only. `taskCount` alone drives
//! selection; there is no busy bit. A separate round-robin-plus-busy-bit
//! policy is a valid alternative but is not implemented here -- the
//! `Available` flag is still accepted on the wire but never drives
//! scheduling in this crate.

use std::sync::Arc;

use crate::worker::WorkerHandle;

/// Scans `workers` left to right, starting with worker 0 as the candidate
/// and replacing it whenever a strictly smaller `taskCount` is found among
/// workers currently in `Ready` state. Ties keep the earlier index. Returns
/// `None` if no worker is `Ready`.
pub fn select_least_busy(workers: &[Arc<WorkerHandle>]) -> Option<usize> {
    let mut candidate: Option<usize> = None;
    for (i, worker) in workers.iter().enumerate() {
        if worker.state().is_terminal() {
            continue;
        }
        candidate = match candidate {
            None => Some(i),
            Some(c) if worker.task_count() < workers[c].task_count() => Some(i),
            Some(c) => Some(c),
        };
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerState;

    fn fixture_handles(task_counts: &[u64]) -> Vec<Arc<WorkerHandle>> {
        task_counts
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let handle = WorkerHandle::new_for_test(i as u32);
                handle.set_state(WorkerState::Ready);
                handle.increment_task_count(n);
                Arc::new(handle)
            })
            .collect()
    }

    #[test]
    fn picks_the_strictly_least_busy_worker() {
        let workers = fixture_handles(&[3, 1, 2]);
        assert_eq!(select_least_busy(&workers), Some(1));
    }

    #[test]
    fn ties_keep_the_earlier_index() {
        let workers = fixture_handles(&[0, 0, 5]);
        assert_eq!(select_least_busy(&workers), Some(0));
    }

    #[test]
    fn skips_terminal_workers() {
        let workers = fixture_handles(&[0, 0]);
        workers[0].set_state(WorkerState::Exited);
        assert_eq!(select_least_busy(&workers), Some(1));
    }

    #[test]
    fn returns_none_when_all_terminal() {
        let workers = fixture_handles(&[0]);
        workers[0].set_state(WorkerState::Disconnected);
        assert_eq!(select_least_busy(&workers), None);
    }
}
