// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios run against the real `echo-worker-demo` binary
//! spawned as a genuine OS child process (not a mock). Framing robustness
//! under arbitrary chunking is covered at the codec level in
//! `dispatch-protocol`; these tests exercise the dispatcher's public
//! surface across a real process boundary.

use std::time::Instant;

use dispatch_core::{DispatchError, DispatchTask, Dispatcher, DispatcherOptions};

fn worker_program() -> &'static str {
    env!("CARGO_BIN_EXE_echo-worker-demo")
}

fn options(process_count: u32) -> DispatcherOptions {
    // The worker doesn't dereference this path (see dispatch-worker::config),
    // it only needs to exist for DispatcherOptions::validate to succeed.
    let initializer = tempfile::NamedTempFile::new().unwrap();
    DispatcherOptions::new(worker_program(), initializer.path()).process_count(process_count)
}

#[tokio::test]
async fn scenario_a_single_worker_echo_round_trips_exactly_once() {
    let dispatcher = Dispatcher::create_instance(options(1)).unwrap();
    dispatcher.start().await.unwrap();

    let task = DispatchTask::new("Echo", "echo").with_arguments(vec![serde_json::json!("hello")]);
    let result = dispatcher.dispatch(task).await.unwrap();

    assert_eq!(result, serde_json::json!("hello"));
    dispatcher.stop();
}

#[tokio::test]
async fn scenario_b_two_workers_run_slow_calls_in_parallel() {
    let dispatcher = Dispatcher::create_instance(options(2)).unwrap();
    dispatcher.start().await.unwrap();

    let start = Instant::now();
    let calls = (0..4).map(|_| {
        let task = DispatchTask::new("Sleep", "sleep").with_arguments(vec![serde_json::json!(200)]);
        dispatcher.dispatch(task)
    });
    let results = futures::future::join_all(calls).await;
    let elapsed = start.elapsed();

    for result in results {
        result.unwrap();
    }
    // Two workers handling 4x 200ms calls (2 each) should finish close to
    // 2x200ms, not 4x200ms serially. Generous bound to avoid CI flakiness.
    assert!(
        elapsed.as_millis() < 700,
        "expected parallel execution across 2 workers, took {elapsed:?}"
    );
    dispatcher.stop();
}

#[tokio::test]
async fn scenario_c_remote_error_preserves_message_and_stack() {
    let dispatcher = Dispatcher::create_instance(options(1)).unwrap();
    dispatcher.start().await.unwrap();

    let task = DispatchTask::new("Sleep", "boom");
    let err = dispatcher.dispatch(task).await.unwrap_err();

    match err {
        DispatchError::RemoteInvocationFailure(e) => {
            assert_eq!(e.message, "boom");
            assert!(e.stack.unwrap().contains("Sleep.boom"));
        }
        other => panic!("expected RemoteInvocationFailure, got {other:?}"),
    }
    dispatcher.stop();
}

#[tokio::test]
async fn scenario_d_unknown_method_names_both_service_and_method() {
    let dispatcher = Dispatcher::create_instance(options(1)).unwrap();
    dispatcher.start().await.unwrap();

    let task = DispatchTask::new("Echo", "does_not_exist");
    let err = dispatcher.dispatch(task).await.unwrap_err();

    match err {
        DispatchError::RemoteInvocationFailure(e) => {
            assert!(e.message.contains("does_not_exist"));
            assert!(e.message.contains("Echo"));
        }
        other => panic!("expected RemoteInvocationFailure, got {other:?}"),
    }
    dispatcher.stop();
}

#[tokio::test]
async fn scenario_e_dispatch_before_start_is_rejected_without_spawning() {
    let dispatcher = Dispatcher::create_instance(options(1)).unwrap();

    let task = DispatchTask::new("Echo", "echo");
    let err = dispatcher.dispatch(task).await.unwrap_err();

    assert!(matches!(err, DispatchError::NotStarted));
    assert!(!dispatcher.is_started());
}

#[tokio::test]
async fn a_worker_can_serve_more_than_one_request_in_sequence() {
    let dispatcher = Dispatcher::create_instance(options(1)).unwrap();
    dispatcher.start().await.unwrap();

    for i in 0..5 {
        let task = DispatchTask::new("Echo", "echo").with_arguments(vec![serde_json::json!(i)]);
        let result = dispatcher.dispatch(task).await.unwrap();
        assert_eq!(result, serde_json::json!(i));
    }
    dispatcher.stop();
}
