//! Integration tests against real Unix processes
//!
//! These tests verify that the supervision layer behaves correctly with the
//! process-group backend: clean exits, signal terminations, spawn failures
//! surfacing through the failure sink, and disposal actually killing the
//! supervised process tree.

#![cfg(unix)]

use proctask_core::process::unix::CommandSpawner;
use proctask_core::{
    spawn_supervisor, CoreError, Expect, ProcessTask, SupervisorConfig, SupervisorEvent,
    TaskContext, TaskOptions,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

/// Check whether a PID still exists (signal 0 probe)
fn process_exists(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

async fn wait_until_gone(pid: u32) {
    timeout(Duration::from_secs(5), async {
        while process_exists(pid) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Process {} was not killed within timeout", pid));
}

#[tokio::test]
async fn test_bounded_task_clean_exit() {
    let task = ProcessTask::with_defaults(Arc::new(CommandSpawner::new("true")));
    let (ctx, _failure_rx) = TaskContext::new();

    let exit = task.run(&ctx).await.expect("Task should succeed");
    assert_eq!(exit.code, Some(0));
    assert_eq!(exit.signal, None);
    assert!(exit.pid.is_some());
}

#[tokio::test]
async fn test_bounded_task_policy_mismatch() {
    let task = ProcessTask::with_defaults(Arc::new(CommandSpawner::new("false")));
    let (ctx, _failure_rx) = TaskContext::new();

    match task.run(&ctx).await {
        Err(CoreError::UnexpectedExit { code, signal }) => {
            assert_eq!(code, Some(1));
            assert_eq!(signal, None);
        }
        other => panic!("Expected UnexpectedExit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bounded_task_expected_exit_code() {
    let spawner = CommandSpawner::new("sh").args(["-c", "exit 7"]);
    let options = TaskOptions {
        expect: Expect::Code(7),
        kill_on_dispose: false,
    };
    let task = ProcessTask::new(Arc::new(spawner), options).unwrap();
    let (ctx, _failure_rx) = TaskContext::new();

    let exit = task.run(&ctx).await.expect("Exit code 7 was expected");
    assert_eq!(exit.code, Some(7));
}

#[tokio::test]
async fn test_bounded_task_kill_on_dispose_reports_signal() {
    let spawner = CommandSpawner::new("sleep").arg("30");
    let options = TaskOptions {
        expect: Expect::Signal("SIGTERM".to_string()),
        kill_on_dispose: true,
    };
    let task = ProcessTask::new(Arc::new(spawner), options).unwrap();
    let (ctx, _failure_rx) = TaskContext::new();

    let runner = tokio::spawn({
        let ctx = ctx.clone();
        async move { task.run(&ctx).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    ctx.dispose();

    let exit = timeout(Duration::from_secs(5), runner)
        .await
        .expect("Task timed out")
        .unwrap()
        .expect("SIGTERM was the expected outcome");
    assert_eq!(exit.code, None);
    assert_eq!(exit.signal.as_deref(), Some("SIGTERM"));
}

#[tokio::test]
async fn test_bounded_task_spawn_failure_rejects() {
    let task = ProcessTask::with_defaults(Arc::new(CommandSpawner::new(
        "nonexistent_command_12345",
    )));
    let (ctx, _failure_rx) = TaskContext::new();

    match task.run(&ctx).await {
        Err(CoreError::ProcessSpawn(_)) => {}
        other => panic!("Expected ProcessSpawn error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_supervisor_respawn_and_dispose_kill_real_processes() {
    let (ctx, _failure_rx) = TaskContext::new();
    let (event_tx, mut event_rx) = broadcast::channel(16);

    let handle = spawn_supervisor(SupervisorConfig {
        spawner: Arc::new(CommandSpawner::new("sleep").arg("30")),
        ctx: ctx.clone(),
        event_tx: Some(event_tx),
    });

    let first = handle.spawn().await.unwrap();
    assert!(first.newly_spawned());
    let first_pid = match event_rx.recv().await.unwrap() {
        SupervisorEvent::ProcessSpawned { pid, .. } => pid.unwrap(),
        other => panic!("Expected ProcessSpawned, got {:?}", other),
    };
    assert!(process_exists(first_pid));

    // Respawn supersedes the first process and kills it.
    let second = handle.respawn().await.unwrap();
    assert!(second.newly_spawned());
    assert_ne!(first.token(), second.token());
    let second_pid = match event_rx.recv().await.unwrap() {
        SupervisorEvent::ProcessSpawned { pid, .. } => pid.unwrap(),
        other => panic!("Expected ProcessSpawned, got {:?}", other),
    };
    wait_until_gone(first_pid).await;
    assert!(process_exists(second_pid));

    // Disposal kills whatever is still attributed.
    ctx.dispose();
    wait_until_gone(second_pid).await;
}

#[tokio::test]
async fn test_supervisor_escalates_spawn_failure() {
    let (ctx, mut failure_rx) = TaskContext::new();

    let handle = spawn_supervisor(SupervisorConfig {
        spawner: Arc::new(CommandSpawner::new("nonexistent_command_12345")),
        ctx: ctx.clone(),
        event_tx: None,
    });

    handle.spawn().await.unwrap();

    let err = timeout(Duration::from_secs(5), failure_rx.recv())
        .await
        .expect("Timed out waiting for failure")
        .expect("Failure sink closed");
    assert!(matches!(err, CoreError::ProcessSpawn(_)));

    ctx.dispose();
}

#[tokio::test]
async fn test_supervisor_clears_slot_on_real_exit() {
    let (ctx, _failure_rx) = TaskContext::new();

    let handle = spawn_supervisor(SupervisorConfig {
        spawner: Arc::new(CommandSpawner::new("true")),
        ctx: ctx.clone(),
        event_tx: None,
    });

    handle.spawn().await.unwrap();

    let mut current_rx = handle.subscribe_current();
    timeout(Duration::from_secs(5), async {
        while current_rx.borrow().is_some() {
            current_rx.changed().await.unwrap();
        }
    })
    .await
    .expect("Slot was not cleared after exit");

    // The slot is free for the next spawn.
    assert!(handle.spawn().await.unwrap().newly_spawned());

    ctx.dispose();
}
