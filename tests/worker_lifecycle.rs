mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{eventually, harness, harness_with, next_event, settings};
use futures::future::BoxFuture;
use futures::FutureExt as _;
use tickvisor::{
    Activity, ConnectTarget, DatabaseId, DbError, Engine, EventKind, MemoryEngine,
    RestartPolicy, RunState, Session, Signal, StartupStatus, Transaction, WorkerContext,
    WorkerDescriptor, WorkerExit, WorkerKind,
};
use tokio::sync::{broadcast, Notify};

#[tokio::test(start_paused = true)]
async fn test_ticks_advance_then_terminate_stops_them() {
    let h = harness(settings(1, 10), 8);
    let db = h.engine.create_database("app");
    h.host.start();

    let pid = h.launcher.launch("app").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let first = h.engine.heartbeat(db).unwrap().seq;
    tokio::time::sleep(Duration::from_secs(2)).await;
    let second = h.engine.heartbeat(db).unwrap().seq;
    assert!(first >= 1);
    assert!(second > first);

    let info = &h.host.processes()[0];
    assert_eq!(info.pid, pid);
    assert_eq!(info.state, RunState::Running);
    assert_eq!(info.activity, Activity::Idle);
    assert_eq!(info.application_name.as_deref(), Some("tickvisor worker"));
    assert_eq!(info.database, Some(db));

    assert!(h.host.signal(pid, Signal::Terminate));
    assert!(eventually(|| h.host.processes().is_empty(), Duration::from_secs(2)).await);

    let stopped_at = h.engine.heartbeat(db).unwrap().seq;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.engine.heartbeat(db).unwrap().seq, stopped_at);
    assert!(!h.host.signal(pid, Signal::Terminate));

    // every tick ran in exactly one committed transaction
    let tx = h.engine.transactions(db);
    assert_eq!(tx.begun, tx.committed);
    assert_eq!(tx.committed, stopped_at);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_during_nap_skips_final_tick() {
    let h = harness(settings(10, -1), 8);
    let db = h.engine.create_database("app");
    h.host.start();

    let pid = h.launcher.launch("app").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(h.engine.heartbeat(db).unwrap().seq, 1);

    // the wake from terminate ends the loop without another tick
    assert!(h.host.signal(pid, Signal::Terminate));
    assert!(eventually(|| h.host.processes().is_empty(), Duration::from_secs(1)).await);
    assert_eq!(h.engine.heartbeat(db).unwrap().seq, 1);
    assert_eq!(h.engine.transactions(db).begun, 1);
}

#[tokio::test(start_paused = true)]
async fn test_terminated_dynamic_worker_is_not_respawned() {
    let h = harness(settings(1, 10), 8);
    h.engine.create_database("app");
    let mut events = h.host.subscribe();
    h.host.start();

    let pid = h.launcher.launch("app").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.host.signal(pid, Signal::Terminate);

    assert!(eventually(|| h.host.processes().is_empty(), Duration::from_secs(2)).await);
    assert_eq!(h.host.free_slots(), 8);

    let respawn = tokio::time::timeout(
        Duration::from_secs(30),
        next_event(&mut events, EventKind::RestartScheduled),
    )
    .await;
    assert!(respawn.is_err());
    assert!(h.host.processes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_heartbeat_table_terminates_worker() {
    let h = harness(settings(1, -1), 8);
    let db = h.engine.create_database("app");
    let mut events = h.host.subscribe();
    h.host.start();

    h.launcher.launch("app").await.unwrap().unwrap();
    h.engine.drop_heartbeat(db);

    assert!(eventually(|| h.host.processes().is_empty(), Duration::from_secs(2)).await);

    let exited = next_event(&mut events, EventKind::WorkerExited).await;
    assert_eq!(exited.exit_code, Some(1));
    assert!(exited.reason.unwrap().contains("tickvisor.heartbeat"));
    assert!(h.engine.heartbeat(db).is_none());
    assert_eq!(h.engine.transactions(db).rolled_back, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reload_applies_new_naptime() {
    let h = harness(settings(10, -1), 8);
    let db = h.engine.create_database("app");
    let mut events = h.host.subscribe();
    h.host.start();

    h.launcher.launch("app").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    h.settings.update(|s| s.naptime = 1);
    h.host.reload().unwrap();
    next_event(&mut events, EventKind::ConfigReloaded).await;
    assert_eq!(h.host.config().current().naptime, Duration::from_secs(1));

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert!(h.engine.heartbeat(db).unwrap().seq >= 3);
}

/// Holds the first armed `execute` until `release` is notified.
#[derive(Default)]
struct Gate {
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

struct GatedEngine {
    inner: MemoryEngine,
    gate: Arc<Gate>,
}

struct GatedSession {
    inner: Box<dyn Session>,
    gate: Arc<Gate>,
}

struct GatedTransaction<'a> {
    inner: Box<dyn Transaction + 'a>,
    gate: Arc<Gate>,
}

#[async_trait]
impl Engine for GatedEngine {
    async fn connect(
        &self,
        target: &ConnectTarget,
        application_name: &str,
    ) -> Result<Box<dyn Session>, DbError> {
        let inner = self.inner.connect(target, application_name).await?;
        Ok(Box::new(GatedSession {
            inner,
            gate: Arc::clone(&self.gate),
        }))
    }

    async fn resolve_database(&self, name: &str) -> Result<Option<DatabaseId>, DbError> {
        self.inner.resolve_database(name).await
    }
}

#[async_trait]
impl Session for GatedSession {
    fn database(&self) -> DatabaseId {
        self.inner.database()
    }

    async fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, DbError> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(GatedTransaction {
            inner,
            gate: Arc::clone(&self.gate),
        }))
    }
}

#[async_trait]
impl<'a> Transaction for GatedTransaction<'a> {
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError> {
        if self.gate.armed.swap(false, Ordering::SeqCst) {
            self.gate.entered.notify_one();
            self.gate.release.notified().await;
        }
        self.inner.execute(statement).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.inner.commit().await
    }
}

fn drain(rx: &mut broadcast::Receiver<tickvisor::Event>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(ev.kind);
    }
    kinds
}

#[tokio::test(start_paused = true)]
async fn test_reload_waits_for_in_progress_tick() {
    let gate = Arc::new(Gate::default());
    let engine_gate = Arc::clone(&gate);
    let h = harness_with(settings(10, -1), 8, move |inner| {
        Arc::new(GatedEngine {
            inner,
            gate: engine_gate,
        })
    });
    let db = h.engine.create_database("app");
    let mut events = h.host.subscribe();
    h.host.start();

    gate.armed.store(true, Ordering::SeqCst);
    h.launcher.launch("app").await.unwrap().unwrap();
    gate.entered.notified().await;

    // hang-up arrives while the first tick is inside its statement
    h.settings.update(|s| s.naptime = 1);
    h.host.reload().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!drain(&mut events).contains(&EventKind::ConfigReloaded));
    assert_eq!(h.host.processes()[0].activity, Activity::Running);
    assert_eq!(h.engine.transactions(db).committed, 0);

    gate.release.notify_one();
    let mut seen = Vec::new();
    loop {
        let ev = events.recv().await.unwrap();
        seen.push(ev.kind);
        if ev.kind == EventKind::ConfigReloaded {
            break;
        }
    }
    assert!(seen.contains(&EventKind::TickCompleted));

    let tx = h.engine.transactions(db);
    assert!(tx.committed >= 1);
    assert_eq!(tx.rolled_back, 0);

    // the worker now naps 1s instead of 10s
    let seq = h.engine.heartbeat(db).unwrap().seq;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(h.engine.heartbeat(db).unwrap().seq >= seq + 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_reload_keeps_previous_config() {
    let h = harness(settings(1, -1), 8);
    let db = h.engine.create_database("app");
    let mut events = h.host.subscribe();
    h.host.start();

    let pid = h.launcher.launch("app").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    h.settings.update(|s| s.naptime = 0);
    assert!(h.host.reload().is_err());
    let rejected = next_event(&mut events, EventKind::ConfigRejected).await;
    assert_eq!(rejected.pid, Some(pid));

    let before = h.engine.heartbeat(db).unwrap().seq;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(h.engine.heartbeat(db).unwrap().seq >= before + 2);
    assert_eq!(h.host.processes()[0].state, RunState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_cancels_all_tickers() {
    let h = harness(settings(1, -1), 8);
    for name in ["a", "b", "c"] {
        h.engine.create_database(name);
    }
    h.host.start();

    for name in ["a", "b", "c"] {
        h.launcher.launch(name).await.unwrap().unwrap();
    }
    assert_eq!(h.host.processes().len(), 3);

    for p in h.host.processes() {
        assert!(h.host.signal(p.pid, Signal::Interrupt));
    }
    assert!(eventually(|| h.host.processes().is_empty(), Duration::from_secs(2)).await);
    assert_eq!(h.host.free_slots(), 8);
}

fn crashing_main(_ctx: WorkerContext) -> BoxFuture<'static, WorkerExit> {
    async { panic!("boom") }.boxed()
}

fn stubborn_main(_ctx: WorkerContext) -> BoxFuture<'static, WorkerExit> {
    futures::future::pending().boxed()
}

fn crasher(restart: RestartPolicy) -> WorkerDescriptor {
    WorkerDescriptor::ticker(WorkerKind::Dynamic, "crasher", restart, DatabaseId::INVALID)
        .with_main(crashing_main)
}

#[tokio::test(start_paused = true)]
async fn test_crashed_unit_is_respawned_after_interval() {
    let h = harness(settings(1, 10), 8);
    let mut events = h.host.subscribe();
    h.host.start();

    let handle = h
        .host
        .register_dynamic(crasher(RestartPolicy::After(Duration::from_secs(5))))
        .unwrap();
    let StartupStatus::Started(first) = handle.wait_for_startup().await else {
        panic!("crasher did not start");
    };

    let exited = next_event(&mut events, EventKind::WorkerExited).await;
    assert_eq!(exited.pid, Some(first));
    assert!(exited.reason.unwrap().contains("boom"));

    let started = tokio::time::Instant::now();
    let scheduled = next_event(&mut events, EventKind::RestartScheduled).await;
    assert_eq!(scheduled.delay_ms, Some(5_000));

    let respawned = next_event(&mut events, EventKind::WorkerSpawned).await;
    assert_ne!(respawned.pid, Some(first));
    assert_eq!(respawned.attempt, Some(2));
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_crashed_unit_without_restart_stays_down() {
    let h = harness(settings(1, 10), 8);
    let mut events = h.host.subscribe();
    h.host.start();

    let handle = h.host.register_dynamic(crasher(RestartPolicy::Never)).unwrap();
    assert!(matches!(
        handle.wait_for_startup().await,
        StartupStatus::Started(_)
    ));
    next_event(&mut events, EventKind::WorkerExited).await;

    let respawn = tokio::time::timeout(
        Duration::from_secs(60),
        next_event(&mut events, EventKind::WorkerSpawned),
    )
    .await;
    assert!(respawn.is_err());
    assert_eq!(h.host.free_slots(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_tickers_within_grace() {
    let h = harness(settings(1, 10), 8);
    h.engine.create_database("app");
    let mut events = h.host.subscribe();
    h.host.start();

    h.launcher.launch("app").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;

    h.host.shutdown().await.unwrap();
    assert!(h.host.processes().is_empty());
    assert!(h.host.is_shutting_down());

    let exited = next_event(&mut events, EventKind::WorkerExited).await;
    assert_eq!(exited.reason.as_deref(), Some("host shutdown"));
    next_event(&mut events, EventKind::AllStoppedWithin).await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_reports_stuck_units() {
    let h = harness(settings(1, 10), 8);
    h.host.start();

    let handle = h
        .host
        .register_dynamic(
            WorkerDescriptor::ticker(
                WorkerKind::Dynamic,
                "stubborn",
                RestartPolicy::Never,
                DatabaseId::INVALID,
            )
            .with_main(stubborn_main),
        )
        .unwrap();
    let StartupStatus::Started(pid) = handle.wait_for_startup().await else {
        panic!("stubborn did not start");
    };

    let err = h.host.shutdown().await.unwrap_err();
    assert_eq!(err.as_label(), "runtime_grace_exceeded");
    match err {
        tickvisor::RuntimeError::GraceExceeded { grace, stuck } => {
            assert_eq!(grace, Duration::from_secs(5));
            assert_eq!(stuck, vec![pid]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
