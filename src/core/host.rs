//! # Host: owns worker slots, supervision actors, and shutdown.
//!
//! The [`Host`] accepts [`WorkerDescriptor`]s, runs one supervision actor per
//! descriptor, and fans events out to subscribers.
//!
//! ## Lifecycle
//! ```text
//! Host::builder(..).build()
//!     │
//!     ├─► register_static(desc)      (only before start; reserves a slot)
//!     ├─► register_dynamic(desc)     (any time before shutdown → WorkerHandle)
//!     │
//! start() ── ready ──► pending static actors spawn; HostReady actors proceed
//!     │
//! run():   SIGHUP → reload()
//!          SIGTERM | SIGINT | SIGQUIT → shutdown()
//!     │
//! shutdown():
//!     ├─► publish ShutdownRequested; cancel runtime token
//!     └─► wait ≤ grace for all actors
//!            ├─ Ok      → AllStoppedWithin
//!            └─ timeout → GraceExceeded (stuck pids)
//! ```
//!
//! ## Rules
//! - Static and dynamic descriptors share `max_worker_processes` slots.
//!   A slot is held from registration until the actor finishes.
//! - A refused dynamic registration never blocks the caller.
//! - Workers observe shutdown at their next wait; a tick is never aborted.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;

use super::actor::{ActorEnv, WorkerActor};
use super::builder::HostBuilder;
use super::handle::{StartupNotifier, WorkerHandle};
use super::latch::Signal;
use super::registry::{ProcessId, ProcessInfo};
use super::shutdown::{HostSignal, HostSignals};
use super::HostConfig;
use crate::config::{ConfigStore, TickerConfig};
use crate::db::Engine;
use crate::error::{ConfigError, RegisterError, RuntimeError};
use crate::events::{Event, EventKind};
use crate::subscribers::SubscriberSet;
use crate::worker::WorkerDescriptor;

struct Pending {
    descriptor: WorkerDescriptor,
    slot: OwnedSemaphorePermit,
}

/// Worker host: the supervisor of every ticker worker.
pub struct Host {
    cfg: HostConfig,
    env: ActorEnv,
    slots: Arc<Semaphore>,
    pending: Mutex<Vec<Pending>>,
    tracker: TaskTracker,
}

impl Host {
    /// Returns a builder.
    pub fn builder(cfg: HostConfig, engine: Arc<dyn Engine>, config: ConfigStore) -> HostBuilder {
        HostBuilder::new(cfg, engine, config)
    }

    pub(super) fn new_internal(cfg: HostConfig, env: ActorEnv, slots: Arc<Semaphore>) -> Self {
        Self {
            cfg,
            env,
            slots,
            pending: Mutex::new(Vec::new()),
            tracker: TaskTracker::new(),
        }
    }

    /// Forwards bus events to the subscriber set (fire-and-forget).
    pub(super) fn subscriber_listener(&self, subs: Arc<SubscriberSet>) {
        if subs.is_empty() {
            return;
        }
        let mut rx = self.env.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => subs.emit(Arc::new(ev)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Host runtime configuration.
    pub fn host_config(&self) -> &HostConfig {
        &self.cfg
    }

    /// The host's ticker config store.
    pub fn config(&self) -> &ConfigStore {
        &self.env.config
    }

    /// The engine workers connect through.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.env.engine
    }

    /// Subscribes to host and worker events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.env.bus.subscribe()
    }

    /// True once [`Host::start`] has run.
    pub fn is_ready(&self) -> bool {
        self.env.ready.is_cancelled()
    }

    /// True once shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.env.runtime_token.is_cancelled()
    }

    /// Number of unreserved worker slots.
    pub fn free_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Registers a descriptor to be spawned when the host starts.
    ///
    /// Only stores the descriptor and reserves a slot: nothing runs until
    /// [`Host::start`].
    pub fn register_static(&self, descriptor: WorkerDescriptor) -> Result<(), RegisterError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        if self.is_shutting_down() {
            return Err(RegisterError::HostShuttingDown);
        }
        if self.is_ready() {
            return Err(RegisterError::TooLate);
        }
        let slot = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| RegisterError::NoFreeSlots)?;

        self.env.bus.publish(
            Event::new(EventKind::WorkerRegistered).with_worker(descriptor.name.as_str()),
        );
        pending.push(Pending { descriptor, slot });
        Ok(())
    }

    /// Registers a descriptor and spawns its supervision actor right away.
    ///
    /// Returns `None` without blocking when no slot is free or the host is
    /// shutting down.
    pub fn register_dynamic(&self, descriptor: WorkerDescriptor) -> Option<WorkerHandle> {
        if self.is_shutting_down() {
            tracing::debug!(worker = %descriptor.name, "dynamic registration refused: host shutting down");
            return None;
        }
        let Ok(slot) = Arc::clone(&self.slots).try_acquire_owned() else {
            tracing::debug!(worker = %descriptor.name, "dynamic registration refused: no free worker slots");
            return None;
        };

        let (handle, notifier) =
            WorkerHandle::new(&descriptor.name, self.env.runtime_token.clone());
        self.env.bus.publish(
            Event::new(EventKind::WorkerRegistered).with_worker(descriptor.name.as_str()),
        );
        self.spawn_actor(descriptor, slot, notifier);
        Some(handle)
    }

    /// Marks the host ready and spawns the pending static workers.
    ///
    /// Idempotent.
    pub fn start(&self) {
        let pending = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if self.is_ready() {
                return;
            }
            self.env.ready.cancel();
            std::mem::take(&mut *pending)
        };

        tracing::info!(
            static_workers = pending.len(),
            max_worker_processes = self.cfg.max_worker_processes,
            "host ready"
        );
        for Pending { descriptor, slot } in pending {
            self.spawn_actor(descriptor, slot, StartupNotifier::none());
        }
    }

    fn spawn_actor(
        &self,
        descriptor: WorkerDescriptor,
        slot: OwnedSemaphorePermit,
        notifier: StartupNotifier,
    ) {
        let actor = WorkerActor::new(descriptor, self.env.clone(), notifier, slot);
        self.tracker.spawn(actor.run());
    }

    /// Starts the host and serves OS signals until shutdown.
    ///
    /// `SIGHUP` reloads configuration; `SIGTERM`, `SIGINT` and `SIGQUIT`
    /// (Ctrl-C elsewhere) shut down gracefully. Also returns when
    /// [`Host::shutdown`] is called from elsewhere.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let mut signals = HostSignals::install()?;
        self.start();

        loop {
            tokio::select! {
                sig = signals.recv() => match sig {
                    HostSignal::Reload => {
                        self.reload_on_sighup();
                    }
                    HostSignal::Shutdown => break,
                },
                _ = self.env.runtime_token.cancelled() => break,
            }
        }
        self.shutdown().await
    }

    /// Reloads the host's config and raises hang-up on every live worker.
    ///
    /// Workers reload on their own at their next wait, even when the host's
    /// reload is rejected.
    pub fn reload(&self) -> Result<Arc<TickerConfig>, ConfigError> {
        let res = self.env.config.reload();
        for entry in self.env.table.entries() {
            entry.signals().raise(Signal::Hangup);
        }
        res
    }

    /// Reload triggered by `SIGHUP`. Logs the outcome; returns true if the
    /// new settings were accepted.
    fn reload_on_sighup(&self) -> bool {
        match self.reload() {
            Ok(cfg) => {
                tracing::info!(
                    naptime = ?cfg.naptime,
                    restart = ?cfg.restart,
                    "configuration reloaded on SIGHUP"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    label = e.as_label(),
                    "SIGHUP reload rejected; workers keep their settings"
                );
                false
            }
        }
    }

    /// Raises `signal` on the live process `pid`. Returns false if there is none.
    pub fn signal(&self, pid: ProcessId, signal: Signal) -> bool {
        match self.env.table.get(pid) {
            Some(entry) => {
                tracing::debug!(%pid, worker = entry.name(), ?signal, "signal raised");
                entry.signals().raise(signal);
                true
            }
            None => false,
        }
    }

    /// Snapshot of all live worker processes, ordered by pid.
    pub fn processes(&self) -> Vec<ProcessInfo> {
        self.env.table.snapshot()
    }

    /// Requests shutdown and waits up to `grace` for every actor to finish.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] and returns [`RuntimeError::GraceExceeded`]
    /// with the pids still live.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        if !self.is_shutting_down() {
            tracing::info!(grace = ?self.cfg.grace, "shutdown requested");
            self.env.bus.publish(Event::new(EventKind::ShutdownRequested));
            self.env.runtime_token.cancel();
        }
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.tracker.close();

        let grace = self.cfg.grace;
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                self.env.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.env.bus.publish(Event::new(EventKind::GraceExceeded));
                let stuck = self.env.table.pids();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{MemorySettings, TickerSettings};
    use crate::db::MemoryEngine;

    #[tokio::test]
    async fn test_sighup_reload_reports_outcome_and_keeps_last_good() {
        let settings = MemorySettings::new(TickerSettings::default());
        let config = ConfigStore::load(settings.clone()).unwrap();
        let host = Host::builder(HostConfig::default(), Arc::new(MemoryEngine::new()), config)
            .build();

        settings.update(|s| s.naptime = 2);
        assert!(host.reload_on_sighup());
        assert_eq!(host.config().current().naptime, Duration::from_secs(2));

        settings.update(|s| s.naptime = 0);
        assert!(!host.reload_on_sighup());
        assert_eq!(host.config().current().naptime, Duration::from_secs(2));
    }
}
