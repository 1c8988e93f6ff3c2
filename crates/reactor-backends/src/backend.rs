//! The readiness-backend trait and the small value types its methods pass
//! around — one uniform interface shared by select/poll/epoll.

use std::os::unix::io::RawFd;

use reactor_core::ids::EventId;
use reactor_core::{ReactorError, Result};

/// What the reactor asks a backend to watch for on one descriptor.
///
/// Carries only what a backend needs to register the descriptor — the
/// callback and priority stay with the reactor's own event slab; the backend
/// never sees them.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub id: EventId,
    pub fd: RawFd,
    pub interest: u8,
}

/// One descriptor the backend observed as ready, reported back to the
/// reactor so it can raise the corresponding event.
#[derive(Debug, Clone, Copy)]
pub struct Readiness {
    pub id: EventId,
    pub observed: u8,
}

/// A readiness-multiplexing implementation. `select`, `poll`, and `epoll`
/// each implement this once; the reactor only ever holds a `Box<dyn Backend>`
/// resolved by name through the [`crate::registry`].
pub trait Backend: Send {
    /// Register a descriptor for the given interest. Fails with
    /// [`ReactorError::Invalid`] if `EDGE` is requested and unsupported, or
    /// [`ReactorError::DescriptorRange`] if the descriptor exceeds whatever
    /// this backend can represent (only meaningful for `select`).
    fn event_register(&mut self, reg: Registration) -> Result<()>;

    /// Unregister a previously registered descriptor. Idempotent: removing a
    /// descriptor that was never registered (or already removed) is not an
    /// error.
    fn event_unregister(&mut self, id: EventId, fd: RawFd) -> Result<()>;

    /// Block for up to `timeout_ms` (or indefinitely when `None`) and append
    /// every descriptor observed ready to `out`. `out` is not cleared first —
    /// callers pass a scratch buffer they own and drain between calls.
    ///
    /// Returns `Ok(())` even when nothing became ready within a finite
    /// timeout: that is simply "deadline reached", not a failure. An infinite
    /// timeout that produces zero ready descriptors
    /// is the one case this reports as [`ReactorError::Invalid`] — the OS
    /// call returning at all without a bound or a signal is unexpected.
    fn fetch_events(&mut self, timeout_ms: Option<u64>, out: &mut Vec<Readiness>) -> Result<()>;

    /// Canonical name this backend is installed under (`"select"`, `"poll"`,
    /// `"epoll"`).
    fn name(&self) -> &'static str;
}

/// Shared tail of every backend's `fetch_events`: the "zero ready entries
/// with an infinite timeout is a backend error" rule every backend applies
/// identically.
pub(crate) fn check_zero_ready(ready_count: usize, timeout_ms: Option<u64>) -> Result<()> {
    if ready_count == 0 && timeout_ms.is_none() {
        return Err(ReactorError::Invalid);
    }
    Ok(())
}

/// Factory signature stored in the backend registry.
pub type BackendFactory = fn() -> Result<Box<dyn Backend>>;
