//! The handle passed to every event/timer callback. No callback may invoke
//! `run` recursively.
//!
//! Rather than handing a callback `&mut Reactor` — which would let it call
//! back into `run` itself, or alias the very event/timer storage the
//! dispatch loop is mid-iteration over — callbacks get a `Scheduler` that can
//! only *queue* a follow-up timer. The reactor applies the queue the moment
//! the callback that filled it returns, so a callback can re-arm its own
//! timer without reentering the loop.

use crate::timer::TimerCallback;

pub struct Scheduler<'a> {
    pub(crate) pending_timers: &'a mut Vec<(u64, TimerCallback)>,
}

impl<'a> Scheduler<'a> {
    /// Queue a new timer for `delay_ms` from now. This is how a periodic
    /// timer re-arms itself: the callback calls this before returning, and
    /// the reactor arms it as a fresh [`reactor_core::TimerId`] right after.
    pub fn add_timer(&mut self, delay_ms: u64, callback: TimerCallback) {
        self.pending_timers.push((delay_ms, callback));
    }
}
