//! # Ticker run loop.
//!
//! ```text
//! Starting ─► connect(target, application_name = name) ─► Running
//!
//! while !terminate {
//!     wait(naptime)          ◄── latch | timeout | host shutdown
//!     host shutdown?         → exit
//!     interrupt?             → Err(Canceled)
//!     hangup?                → ReloadingConfig → reload → Running
//!     tick: begin → execute(statement) → commit
//! }
//! Terminating ─► exit (code 1)
//! ```
//!
//! ## Rules
//! - The latch wait is the only suspension point between ticks.
//! - Flags are only consumed here, never in the code that raises them.
//! - Errors are not caught: they end the unit and the host restarts it.

use futures::future::BoxFuture;
use futures::FutureExt as _;

use super::tick::run_tick;
use super::{WorkerContext, WorkerExit};
use crate::config::TickerConfig;
use crate::core::{Activity, RunState, Signal, WakeReason};
use crate::db::{ConnectTarget, DatabaseId};
use crate::error::WorkerError;
use crate::events::{Event, EventKind};

/// Main entry of a ticker worker unit.
pub fn ticker_main(ctx: WorkerContext) -> BoxFuture<'static, WorkerExit> {
    async move {
        match run(&ctx).await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::error!(
                    worker = %ctx.descriptor.name,
                    pid = %ctx.process.pid(),
                    error = %e,
                    label = e.as_label(),
                    "worker terminated by error"
                );
                WorkerExit::Failed(e)
            }
        }
    }
    .boxed()
}

fn connect_target(cfg: &TickerConfig, main_arg: DatabaseId) -> ConnectTarget {
    match &cfg.database {
        Some(name) => ConnectTarget::Name(name.clone()),
        None => ConnectTarget::Id(main_arg),
    }
}

async fn run(ctx: &WorkerContext) -> Result<WorkerExit, WorkerError> {
    let process = &ctx.process;
    let signals = process.signals();
    let name = ctx.descriptor.name.as_str();

    let target = connect_target(&ctx.config.current(), ctx.descriptor.main_arg);
    let mut session = ctx
        .engine
        .connect(&target, name)
        .await
        .map_err(WorkerError::Connect)?;

    process.set_application_name(name);
    process.set_database(session.database());
    process.set_state(RunState::Running);
    process.report_activity(Activity::Idle, None);

    tracing::info!(worker = name, pid = %process.pid(), %target, "{name} initialized");
    ctx.bus.publish(
        Event::new(EventKind::WorkerInitialized)
            .with_worker(name)
            .with_pid(process.pid())
            .with_reason(session.database().to_string()),
    );

    let mut ticks: u64 = 0;
    while !signals.is_pending(Signal::Terminate) {
        let naptime = ctx.config.current().naptime;
        if signals.wait(naptime, &ctx.shutdown).await == WakeReason::HostShutdown {
            process.set_state(RunState::Terminating);
            return Ok(WorkerExit::HostShutdown);
        }

        if signals.take(Signal::Interrupt) {
            return Err(WorkerError::Canceled);
        }

        if signals.take(Signal::Hangup) {
            process.set_state(RunState::ReloadingConfig);
            let event = match ctx.config.reload() {
                Ok(_) => Event::new(EventKind::ConfigReloaded),
                Err(e) => Event::new(EventKind::ConfigRejected).with_reason(e.to_string()),
            };
            ctx.bus
                .publish(event.with_worker(name).with_pid(process.pid()));
            process.set_state(RunState::Running);
        }

        // terminate raised during the wait: no further tick
        if signals.is_pending(Signal::Terminate) {
            break;
        }

        let statement = ctx.config.current().statement.clone();
        run_tick(session.as_mut(), process, &statement)
            .await
            .map_err(WorkerError::Tick)?;

        ticks += 1;
        tracing::trace!(worker = name, pid = %process.pid(), ticks, "tick committed");
        ctx.bus.publish(
            Event::new(EventKind::TickCompleted)
                .with_worker(name)
                .with_pid(process.pid())
                .with_attempt(ticks),
        );
    }

    process.set_state(RunState::Terminating);
    tracing::info!(worker = name, pid = %process.pid(), ticks, "{name} terminating");
    Ok(WorkerExit::Terminated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_database_wins_over_main_arg() {
        let mut cfg = TickerConfig::default();
        assert_eq!(
            connect_target(&cfg, DatabaseId(7)),
            ConnectTarget::Id(DatabaseId(7))
        );

        cfg.database = Some("app".into());
        assert_eq!(
            connect_target(&cfg, DatabaseId(7)),
            ConnectTarget::Name("app".into())
        );
    }
}
