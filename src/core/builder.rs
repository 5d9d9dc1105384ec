use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::actor::ActorEnv;
use super::host::Host;
use super::registry::ProcessTable;
use super::HostConfig;
use crate::config::ConfigStore;
use crate::db::Engine;
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`Host`].
pub struct HostBuilder {
    cfg: HostConfig,
    engine: Arc<dyn Engine>,
    config: ConfigStore,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl HostBuilder {
    /// Creates a builder for a host running workers against `engine`.
    pub fn new(cfg: HostConfig, engine: Arc<dyn Engine>, config: ConfigStore) -> Self {
        Self {
            cfg,
            engine,
            config,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive host and worker events through dedicated tasks
    /// with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the host. Must be called inside a tokio runtime (spawns the
    /// subscriber workers).
    pub fn build(self) -> Arc<Host> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let slots = Arc::new(Semaphore::new(self.cfg.max_worker_processes));

        let env = ActorEnv {
            bus,
            table: Arc::new(ProcessTable::new()),
            engine: self.engine,
            config: Arc::new(self.config),
            runtime_token: CancellationToken::new(),
            ready: CancellationToken::new(),
        };

        let host = Arc::new(Host::new_internal(self.cfg, env, slots));
        host.subscriber_listener(subs);
        host
    }
}
