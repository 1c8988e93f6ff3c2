//! # reactor — the single-threaded event loop
//!
//! This is the facade crate: it ties [`reactor_core`]'s shared vocabulary,
//! [`reactor_backends`]'s select/poll/epoll implementations, and
//! [`reactor_worker`]'s offload thread together into the [`Reactor`] type.
//! Downstream users depend on this crate alone; the three lower crates are
//! implementation detail they never need to name directly.
//!
//! Wiring a [`reactor_worker::Worker`] into the loop needs no special API:
//! its [`reactor_worker::Worker::event_fd`] is an ordinary readable
//! descriptor, registered with [`Reactor::add_event`] like any other
//! readiness source.

mod event;
mod ready;
mod reactor;
mod scheduler;
mod timer;

pub use event::EventCallback;
pub use reactor::{Reactor, ReactorConfig};
pub use reactor_core::flags::{interest, observed, publish};
pub use reactor_core::{EventId, ReactorError, Result, TimerId};
pub use scheduler::Scheduler;
pub use timer::TimerCallback;
