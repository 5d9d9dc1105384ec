mod common;

use std::time::Duration;

use common::{eventually, harness, settings};
use tickvisor::{
    register_static_workers, DatabaseId, LaunchError, RegisterError, RestartPolicy, Signal,
    StartupStatus, TickerSettings, WorkerDescriptor, WorkerKind,
};

#[tokio::test(start_paused = true)]
async fn test_second_launch_is_suppressed() {
    let h = harness(settings(1, 10), 8);
    let db = h.engine.create_database("app");
    h.host.start();

    let pid = h.launcher.launch("app").await.unwrap();
    assert!(pid.is_some());
    assert_eq!(h.launcher.find_running(db), pid);
    assert_eq!(h.launcher.launch("app").await.unwrap(), None);
    assert_eq!(h.host.processes().len(), 1);

    // the raw variant skips the guard
    assert!(h.launcher.launch_raw(db).await.unwrap().is_some());
    assert_eq!(h.host.processes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_database() {
    let h = harness(settings(1, 10), 8);
    h.host.start();

    let err = h.launcher.launch("nope").await.unwrap_err();
    assert!(matches!(err, LaunchError::UnknownDatabase(ref name) if name == "nope"));
    assert!(h.host.processes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_no_free_slot_returns_none() {
    let h = harness(settings(1, 10), 1);
    h.engine.create_database("a");
    h.engine.create_database("b");
    h.host.start();

    assert!(h.launcher.launch("a").await.unwrap().is_some());
    assert_eq!(h.launcher.launch("b").await.unwrap(), None);
    assert_eq!(h.host.free_slots(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_launch_if_consults_predicate() {
    let h = harness(settings(1, 10), 8);
    let db = h.engine.create_database("app");
    h.host.start();

    assert_eq!(h.launcher.launch_if("app", &h.engine).await.unwrap(), None);

    h.engine.set_replicated(db, true);
    assert!(h.launcher.launch_if("app", &h.engine).await.unwrap().is_some());
    assert_eq!(h.launcher.launch_if("app", &h.engine).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_launch_during_shutdown() {
    let h = harness(settings(1, 10), 8);
    h.engine.create_database("app");

    // not started yet: the worker waits for the host to become ready
    let launcher = h.launcher.clone();
    let pending = tokio::spawn(async move { launcher.launch("app").await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    h.host.shutdown().await.unwrap();
    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, LaunchError::HostShuttingDown));
    assert!(err.hint().is_some());

    assert_eq!(h.launcher.launch("app").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_relaunch_after_interrupt_runs_single_ticker() {
    // restart_time is set, but it only applies to static workers
    let h = harness(settings(1, 10), 8);
    let db = h.engine.create_database("app");
    h.host.start();

    let first = h.launcher.launch("app").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.host.signal(first, Signal::Interrupt));
    assert!(eventually(|| h.host.processes().is_empty(), Duration::from_secs(2)).await);
    assert_eq!(h.launcher.find_running(db), None);

    let second = h.launcher.launch("app").await.unwrap().unwrap();
    assert_ne!(second, first);

    // past the restart window: the interrupted ticker must not come back
    tokio::time::sleep(Duration::from_secs(12)).await;
    let live: Vec<_> = h
        .host
        .processes()
        .into_iter()
        .filter(|p| p.target == db || p.database == Some(db))
        .map(|p| p.pid)
        .collect();
    assert_eq!(live, vec![second]);
    assert_eq!(h.host.free_slots(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_host_shutdown_before_start_reaches_handle() {
    let h = harness(settings(1, 10), 8);
    let handle = h
        .host
        .register_dynamic(WorkerDescriptor::ticker(
            WorkerKind::Dynamic,
            "tickvisor worker",
            RestartPolicy::Never,
            DatabaseId(99),
        ))
        .unwrap();

    // the host never starts and shuts down: the actor gives up before spawning
    h.host.shutdown().await.unwrap();
    assert_eq!(handle.wait_for_startup().await, StartupStatus::HostShutdown);
}

#[tokio::test(start_paused = true)]
async fn test_static_workers_need_a_database() {
    let h = harness(settings(1, 10), 8);
    assert_eq!(register_static_workers(&h.host), 0);
    h.host.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.host.processes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_static_workers_register_before_start() {
    let h = harness(
        TickerSettings {
            database: Some("app".into()),
            total_workers: 2,
            ..settings(1, 10)
        },
        8,
    );
    let db = h.engine.create_database("app");

    assert_eq!(register_static_workers(&h.host), 2);
    assert_eq!(h.host.free_slots(), 6);
    // registration alone spawns nothing
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.host.processes().is_empty());

    h.host.start();
    assert!(
        eventually(
            || h.host.processes().iter().all(|p| p.database == Some(db))
                && h.host.processes().len() == 2,
            Duration::from_secs(1)
        )
        .await
    );
    let names: Vec<_> = h.host.processes().into_iter().map(|p| p.name).collect();
    assert_eq!(names, ["tickvisor worker 1", "tickvisor worker 2"]);

    // static workers connected to "app" count for the duplicate guard
    assert_eq!(h.launcher.launch("app").await.unwrap(), None);

    // too late now
    assert_eq!(register_static_workers(&h.host), 0);
    let late = WorkerDescriptor::ticker(
        WorkerKind::Static,
        "tickvisor worker 3",
        RestartPolicy::Never,
        DatabaseId::INVALID,
    );
    assert_eq!(h.host.register_static(late), Err(RegisterError::TooLate));

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(h.engine.heartbeat(db).unwrap().seq >= 4);
}

#[tokio::test(start_paused = true)]
async fn test_static_registration_respects_slots() {
    let h = harness(
        TickerSettings {
            database: Some("app".into()),
            total_workers: 3,
            ..settings(1, 10)
        },
        2,
    );
    h.engine.create_database("app");

    assert_eq!(register_static_workers(&h.host), 2);
    assert_eq!(h.host.free_slots(), 0);
}
