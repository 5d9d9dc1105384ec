//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the host, its supervision actors,
//! and the worker run loops.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Host` (registration, shutdown), supervision actors
//!   (spawn/exit/restart), worker run loops (initialized/tick/reload),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the host's fan-out listener (→ `SubscriberSet`) and any
//!   caller of [`Host::subscribe`](crate::Host::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
