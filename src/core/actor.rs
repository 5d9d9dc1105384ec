//! # WorkerActor: supervises one worker descriptor.
//!
//! One actor per registered descriptor. The actor owns the descriptor's slot
//! permit for its whole life and respawns the worker unit per the restart
//! policy.
//!
//! ## Event flow
//! ```text
//! [wait for start trigger]
//! loop {
//!   ├─► insert process entry (new pid)
//!   ├─► publish WorkerSpawned; first spawn → Started(pid) to the handle
//!   ├─► tokio::spawn(main(ctx)) ──► WorkerExit (panic → Crashed)
//!   ├─► remove entry; publish WorkerExited (exit code 1)
//!   └─► restart policy
//!         ├─► Never     → break
//!         └─► After(d)  → publish RestartScheduled, sleep(d) (cancellable)
//! }
//! ```
//!
//! ## Rules
//! - Units of one descriptor run **sequentially** (never two at once).
//! - The process entry exists before the unit runs and is removed only after
//!   it exits, so signals raised in between are never lost.
//! - Host shutdown is checked before every spawn and during the restart sleep.

use std::any::Any;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::handle::{StartupNotifier, StartupStatus};
use super::registry::{ProcessId, ProcessTable, RunState};
use crate::config::ConfigStore;
use crate::db::Engine;
use crate::events::{Bus, Event, EventKind};
use crate::worker::{StartTrigger, WorkerContext, WorkerDescriptor, WorkerExit};

/// Host resources shared by every actor.
#[derive(Clone)]
pub(crate) struct ActorEnv {
    pub bus: Bus,
    pub table: Arc<ProcessTable>,
    pub engine: Arc<dyn Engine>,
    pub config: Arc<ConfigStore>,
    /// Cancelled when the host shuts down.
    pub runtime_token: CancellationToken,
    /// Cancelled once, when the host becomes ready.
    pub ready: CancellationToken,
}

pub(crate) struct WorkerActor {
    descriptor: Arc<WorkerDescriptor>,
    env: ActorEnv,
    startup: StartupNotifier,
    _slot: OwnedSemaphorePermit,
}

impl WorkerActor {
    pub(crate) fn new(
        descriptor: WorkerDescriptor,
        env: ActorEnv,
        startup: StartupNotifier,
        slot: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            env,
            startup,
            _slot: slot,
        }
    }

    /// Runs until the restart policy says stop or the host shuts down.
    pub(crate) async fn run(mut self) {
        if !self.wait_for_trigger().await {
            self.startup.notify(StartupStatus::HostShutdown);
            return;
        }

        let mut spawns: u64 = 0;
        loop {
            if self.env.runtime_token.is_cancelled() {
                self.startup.notify(StartupStatus::HostShutdown);
                break;
            }

            spawns += 1;
            let (pid, exit) = self.run_once(spawns).await;

            let mut exited = Event::new(EventKind::WorkerExited)
                .with_worker(self.descriptor.name.as_str())
                .with_pid(pid)
                .with_exit_code(exit.code());
            if let Some(reason) = exit.reason() {
                exited = exited.with_reason(reason);
            }
            self.env.bus.publish(exited);

            let Some(delay) = self.descriptor.restart.delay() else {
                break;
            };
            if self.env.runtime_token.is_cancelled() {
                break;
            }

            self.env.bus.publish(
                Event::new(EventKind::RestartScheduled)
                    .with_worker(self.descriptor.name.as_str())
                    .with_delay(delay)
                    .with_attempt(spawns),
            );
            tokio::select! {
                _ = time::sleep(delay) => {},
                _ = self.env.runtime_token.cancelled() => break,
            }
        }
    }

    /// Waits for the descriptor's start trigger. Returns false on host shutdown.
    async fn wait_for_trigger(&self) -> bool {
        match self.descriptor.start_trigger {
            StartTrigger::HostStart => !self.env.runtime_token.is_cancelled(),
            StartTrigger::HostReady => {
                tokio::select! {
                    biased;
                    _ = self.env.runtime_token.cancelled() => false,
                    _ = self.env.ready.cancelled() => true,
                }
            }
        }
    }

    /// Spawns one unit and waits for it to exit.
    async fn run_once(&mut self, spawns: u64) -> (ProcessId, WorkerExit) {
        let entry = self.env.table.insert(&self.descriptor);
        let pid = entry.pid();

        self.env.bus.publish(
            Event::new(EventKind::WorkerSpawned)
                .with_worker(self.descriptor.name.as_str())
                .with_pid(pid)
                .with_attempt(spawns),
        );
        self.startup.notify(StartupStatus::Started(pid));

        let ctx = WorkerContext {
            process: Arc::clone(&entry),
            descriptor: Arc::clone(&self.descriptor),
            engine: Arc::clone(&self.env.engine),
            config: self.env.config.fork(),
            shutdown: self.env.runtime_token.clone(),
            bus: self.env.bus.clone(),
        };

        let exit = match tokio::spawn((self.descriptor.main)(ctx)).await {
            Ok(exit) => exit,
            Err(e) if e.is_panic() => WorkerExit::Crashed(panic_message(e.into_panic())),
            Err(e) => WorkerExit::Crashed(e.to_string()),
        };

        entry.set_state(RunState::Stopped);
        self.env.table.remove(pid);
        (pid, exit)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
