#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tickvisor::{
    ConfigStore, Engine, Event, EventKind, Host, HostConfig, Launcher, MemoryEngine,
    MemorySettings, TickerSettings,
};
use tokio::sync::broadcast;
use tokio::time::Instant;

pub struct Harness {
    pub engine: MemoryEngine,
    pub settings: Arc<MemorySettings>,
    pub host: Arc<Host>,
    pub launcher: Launcher,
}

/// Host over an in-memory engine. Must run inside a tokio runtime.
pub fn harness(settings: TickerSettings, max_worker_processes: usize) -> Harness {
    harness_with(settings, max_worker_processes, |engine| Arc::new(engine))
}

/// Like [`harness`], but the host sees the engine returned by `wrap`.
pub fn harness_with(
    settings: TickerSettings,
    max_worker_processes: usize,
    wrap: impl FnOnce(MemoryEngine) -> Arc<dyn Engine>,
) -> Harness {
    let engine = MemoryEngine::new();
    let settings = MemorySettings::new(settings);
    let config = ConfigStore::load(settings.clone()).unwrap();
    let cfg = HostConfig {
        grace: Duration::from_secs(5),
        max_worker_processes,
        ..HostConfig::default()
    };
    let host = Host::builder(cfg, wrap(engine.clone()), config).build();
    let launcher = Launcher::new(Arc::clone(&host));

    Harness {
        engine,
        settings,
        host,
        launcher,
    }
}

pub fn settings(naptime: i64, restart_time: i64) -> TickerSettings {
    TickerSettings {
        naptime,
        restart_time,
        ..TickerSettings::default()
    }
}

/// Polls `f` every 50ms (virtual time) until it holds or `within` elapses.
pub async fn eventually(mut f: impl FnMut() -> bool, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    f()
}

/// Receives events until one of `kind` arrives.
pub async fn next_event(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    loop {
        match rx.recv().await {
            Ok(ev) if ev.kind == kind => return ev,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
        }
    }
}
