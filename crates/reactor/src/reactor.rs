//! The single-threaded event loop: owns the timer heap, ready queue,
//! event slab, and a boxed [`Backend`] trait object, and drives them all from
//! one `run` call on the calling thread.

use std::os::unix::io::RawFd;

use reactor_backends::{registry, Backend, Readiness, Registration};
use reactor_core::flags::interest as interest_flags;
use reactor_core::time::monotonic_ms;
use reactor_core::{EventId, ReactorError, Result, TimerId};

use crate::event::{Event, EventCallback, EventSlab};
use crate::scheduler::Scheduler;
use crate::timer::{TimerCallback, TimerHeap};
use crate::ready::ReadyQueue;

/// Builder-style constructor knobs. This crate has no outer
/// deployment/config-file surface, just constructor-time tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReactorConfig {
    /// Initial capacity of the scratch buffer `fetch_events` fills each
    /// iteration. Grows on demand; this only avoids early reallocation.
    pub ready_scratch_capacity: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self { ready_scratch_capacity: 64 }
    }
}

/// A single-threaded, readiness-multiplexing event loop.
pub struct Reactor {
    backend: Box<dyn Backend>,
    events: EventSlab,
    timers: TimerHeap,
    ready: ReadyQueue,
    current_ms: u64,
    scratch: Vec<Readiness>,
}

impl Reactor {
    /// Resolve `backend_name` through the process-wide registry (installing
    /// the built-ins first, idempotently) and build an empty reactor around
    /// it.
    pub fn create(backend_name: &str) -> Result<Self> {
        Self::create_with_config(backend_name, ReactorConfig::default())
    }

    pub fn create_with_config(backend_name: &str, config: ReactorConfig) -> Result<Self> {
        registry::install_builtin_backends();
        let backend = registry::create(backend_name)?;
        eprintln!("reactor: created — backend={}", backend.name());
        Ok(Self {
            backend,
            events: EventSlab::default(),
            timers: TimerHeap::default(),
            ready: ReadyQueue::default(),
            current_ms: monotonic_ms(),
            scratch: Vec::with_capacity(config.ready_scratch_capacity),
        })
    }

    /// Install an event. If `interest` does not include `BLOCKING`, `fd` is
    /// switched to non-blocking mode first.
    pub fn add_event(
        &mut self,
        fd: RawFd,
        interest: u8,
        priority: i32,
        callback: EventCallback,
    ) -> Result<EventId> {
        if interest & interest_flags::BLOCKING == 0 {
            set_non_blocking(fd)?;
        }

        let id = self.events.insert(Event {
            fd,
            interest,
            priority,
            callback: Some(callback),
            pending: false,
            observed: 0,
        });

        if let Err(e) = self.backend.event_register(Registration { id, fd, interest }) {
            self.events.remove(id);
            return Err(e);
        }

        Ok(id)
    }

    /// Unregister an event. A no-op for an id that is unknown or already
    /// removed.
    pub fn remove_event(&mut self, id: EventId) {
        let Some(event) = self.events.remove(id) else {
            return;
        };
        if event.pending {
            self.ready.cancel(id);
        }
        if let Err(e) = self.backend.event_unregister(id, event.fd) {
            eprintln!("reactor: backend unregister failed for {:?}: {}", id, e);
        }
    }

    /// Enqueue a registered event into the ready queue. A no-op if it is
    /// already pending; an error if `id` is not a live registration.
    pub fn raise_event(&mut self, id: EventId) -> Result<()> {
        let event = self.events.get_mut(id).ok_or(ReactorError::Invalid)?;
        if event.pending {
            return Ok(());
        }
        event.pending = true;
        self.ready.push(id, event.priority);
        Ok(())
    }

    /// Arm a one-shot timer `delay_ms` from now. A zero delay fires on the
    /// next loop iteration once `fetch_events` returns.
    pub fn add_timer(&mut self, delay_ms: u64, callback: TimerCallback) -> TimerId {
        let expiry_ms = self.current_ms.saturating_add(delay_ms);
        self.timers.insert(expiry_ms, callback)
    }

    /// Disarm a timer. Idempotent.
    pub fn remove_timer(&mut self, id: TimerId) {
        self.timers.remove(id);
    }

    /// Drive the loop until `run_timeout_ms` elapses or a callback reports a
    /// non-zero status. `u64::MAX` means run forever.
    pub fn run(&mut self, run_timeout_ms: u64) -> Result<i32> {
        let mut remaining = run_timeout_ms;

        loop {
            self.current_ms = monotonic_ms();

            let timer_wait = self.timers.peek_deadline_ms().map(|d| d.saturating_sub(self.current_ms));
            let sleep_ms = match (timer_wait, remaining) {
                (Some(t), u64::MAX) => Some(t),
                (Some(t), r) => Some(t.min(r)),
                (None, u64::MAX) => None,
                (None, r) => Some(r),
            };

            let start_ms = self.current_ms;
            self.backend.fetch_events(sleep_ms, &mut self.scratch)?;
            for readiness in self.scratch.drain(..) {
                if let Some(event) = self.events.get_mut(readiness.id) {
                    event.observed = readiness.observed;
                }
                self.raise_if_registered(readiness.id);
            }

            self.current_ms = monotonic_ms();

            // Timer pass: every due timer fires before any ready event this
            // iteration.
            while let Some(mut entry) = self.timers.pop_due(self.current_ms) {
                let mut rearm = Vec::new();
                let status = {
                    let mut scheduler = Scheduler { pending_timers: &mut rearm };
                    (entry.callback)(&mut scheduler)
                };
                for (delay_ms, callback) in rearm {
                    self.add_timer(delay_ms, callback);
                }
                if status != 0 {
                    return Ok(status);
                }
                self.current_ms = monotonic_ms();
            }

            // Event pass: highest priority (lowest value) first.
            while let Some(id) = self.ready.pop() {
                let Some(event) = self.events.get_mut(id) else {
                    continue;
                };
                event.pending = false;
                let fd = event.fd;
                let observed = event.observed;
                // Take the callback out so invoking it never aliases this
                // event's own slot in the slab — it may remove or
                // re-register itself before returning.
                let mut callback = event.callback.take().expect("event callback missing");

                let mut rearm = Vec::new();
                let status = {
                    let mut scheduler = Scheduler { pending_timers: &mut rearm };
                    callback(&mut scheduler, fd, observed)
                };

                if let Some(event) = self.events.get_mut(id) {
                    event.callback = Some(callback);
                }
                for (delay_ms, callback) in rearm {
                    self.add_timer(delay_ms, callback);
                }
                if status != 0 {
                    return Ok(status);
                }
            }

            if remaining != u64::MAX {
                let elapsed = monotonic_ms().saturating_sub(start_ms);
                if elapsed >= remaining {
                    return Ok(0);
                }
                remaining -= elapsed;
            }
        }
    }

    fn raise_if_registered(&mut self, id: EventId) {
        if let Some(event) = self.events.get_mut(id) {
            if !event.pending {
                event.pending = true;
                self.ready.push(id, event.priority);
            }
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        eprintln!("reactor: destroyed — backend={}", self.backend.name());
    }
}

fn set_non_blocking(fd: RawFd) -> Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(ReactorError::from_errno());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(ReactorError::from_errno());
        }
    }
    Ok(())
}
