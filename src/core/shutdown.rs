//! # OS signal handling for the host.
//!
//! [`HostSignals`] maps process signals onto host actions:
//!
//! **Unix platforms:**
//! - `SIGHUP` → reload configuration in the host and every worker
//! - `SIGINT`, `SIGTERM`, `SIGQUIT` → graceful shutdown
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`] → graceful shutdown

/// Host action requested by an OS signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HostSignal {
    Reload,
    Shutdown,
}

/// Installed signal listeners. Listeners stay registered until dropped.
#[cfg(unix)]
pub(crate) struct HostSignals {
    sighup: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl HostSignals {
    /// Registers the listeners. Fails if signal registration fails.
    pub(crate) fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sighup: signal(SignalKind::hangup())?,
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }

    /// Waits for the next signal.
    pub(crate) async fn recv(&mut self) -> HostSignal {
        tokio::select! {
            _ = self.sighup.recv() => HostSignal::Reload,
            _ = self.sigint.recv() => HostSignal::Shutdown,
            _ = self.sigterm.recv() => HostSignal::Shutdown,
            _ = self.sigquit.recv() => HostSignal::Shutdown,
        }
    }
}

#[cfg(not(unix))]
pub(crate) struct HostSignals;

#[cfg(not(unix))]
impl HostSignals {
    pub(crate) fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Waits for Ctrl-C. A listener error is treated as a shutdown request.
    pub(crate) async fn recv(&mut self) -> HostSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c listener failed");
        }
        HostSignal::Shutdown
    }
}
