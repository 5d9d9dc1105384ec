//! # Event subscribers.
//!
//! ```text
//! Host ── publish(Event) ──► Bus ──► host listener ──► SubscriberSet::emit
//!                                                        ├──► LogWriter (tracing)
//!                                                        └──► custom Subscribe impls
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
