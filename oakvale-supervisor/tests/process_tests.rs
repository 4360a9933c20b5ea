//! Child-process workers, using throwaway shell scripts as stand-ins
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use oakvale_core::character::{CharacterId, LifeStatus};
use oakvale_core::config::SchedulerConfig;
use oakvale_core::engine::{DecisionSource, Roster, RosterEntry};
use oakvale_core::world::Position;
use oakvale_supervisor::{
    NpcProcessManager, ProcessRuntime, ProcessRuntimeConfig, SupervisorError, WorkerRuntime,
    WorkerState,
};
use tempfile::TempDir;

fn script(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("worker.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn runtime(program: PathBuf) -> ProcessRuntime {
    ProcessRuntime::new(ProcessRuntimeConfig {
        program,
        args: Vec::new(),
        ..ProcessRuntimeConfig::default()
    })
    .unwrap()
}

fn roster() -> Roster {
    Roster {
        player: Some(Position::new(0, 0)),
        npcs: vec![RosterEntry {
            id: "npc".into(),
            position: Position::new(1, 0),
            status: LifeStatus::Alive,
        }],
    }
}

#[test]
fn test_missing_binary_is_rejected() {
    let result = ProcessRuntime::new(ProcessRuntimeConfig {
        program: PathBuf::from("/definitely/not/here/oakvale"),
        ..ProcessRuntimeConfig::default()
    });
    assert!(matches!(result, Err(SupervisorError::BinaryNotFound(_))));
}

#[tokio::test]
async fn test_exited_process_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = runtime(script(&dir, "exit 3"));

    let mut channels = runtime.spawn(&CharacterId::from("npc")).await.unwrap();
    assert!(channels.control.pid().is_some());
    assert!(channels.control.wait_exit(Duration::from_secs(5)).await);
    assert!(channels.control.is_finished());
}

#[tokio::test]
async fn test_unresponsive_process_is_killed_on_terminate() {
    let dir = tempfile::tempdir().unwrap();
    // Ignores stdin entirely, so the shutdown sentinel goes unanswered
    let runtime = runtime(script(&dir, "exec sleep 600"));
    let config = SchedulerConfig {
        shutdown_grace: Duration::from_millis(100),
        ..SchedulerConfig::default()
    };
    let mut manager = NpcProcessManager::new(Arc::new(runtime), config);
    let npc = CharacterId::from("npc");

    manager.tick(Duration::ZERO, &roster()).await.unwrap();
    assert_eq!(manager.state(&npc), Some(WorkerState::Active));
    assert!(manager.worker(&npc).unwrap().pid().is_some());

    manager.terminate(&npc).await.unwrap();
    assert_eq!(manager.state(&npc), Some(WorkerState::Terminated));
    assert!(!manager.worker(&npc).unwrap().is_running());
    manager.shutdown().await.unwrap();
}
