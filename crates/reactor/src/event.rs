//! Reactor-owned event registrations.
//!
//! The `Reactor` is the sole owner of every `Event` once `add_event` installs
//! it; callers only ever see the opaque [`EventId`] handle `add_event`
//! returns.

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use reactor_core::EventId;

use crate::scheduler::Scheduler;

/// Something to run when a descriptor becomes ready. A boxed closure
/// captures whatever context it needs directly, rather than a function
/// pointer paired with a separate cookie.
pub type EventCallback = Box<dyn FnMut(&mut Scheduler, RawFd, u8) -> i32>;

pub(crate) struct Event {
    pub(crate) fd: RawFd,
    pub(crate) interest: u8,
    pub(crate) priority: i32,
    /// `None` only while the dispatch loop has temporarily taken the
    /// callback out to invoke it without aliasing this event's own slot in
    /// the slab (a callback may remove or re-register itself).
    pub(crate) callback: Option<EventCallback>,
    /// True iff this event currently has an entry in the ready queue.
    pub(crate) pending: bool,
    /// Observed flags set by the backend the last time it reported this
    /// descriptor ready; read and handed to the callback during the event
    /// pass.
    pub(crate) observed: u8,
}

/// Owning store of registered events, keyed by [`EventId`].
///
/// Ids are handed out by a monotonically increasing counter and never
/// recycled. A free-list/slot-reuse allocator would let a reused id collide
/// with a stale ready-queue or timer-heap entry still carrying the old
/// occupant's id; this crate trades the memory savings of a recycled-index
/// scheme for ids that are safe to use as heap tombstone keys.
#[derive(Default)]
pub(crate) struct EventSlab {
    events: HashMap<EventId, Event>,
    next_id: u32,
}

impl EventSlab {
    pub(crate) fn insert(&mut self, event: Event) -> EventId {
        let id = EventId::new(self.next_id);
        self.next_id += 1;
        self.events.insert(id, event);
        id
    }

    pub(crate) fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.events.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: EventId) -> Option<Event> {
        self.events.remove(&id)
    }

    pub(crate) fn contains(&self, id: EventId) -> bool {
        self.events.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_event(fd: RawFd, priority: i32) -> Event {
        Event { fd, interest: 0, priority, callback: Some(Box::new(|_, _, _| 0)), pending: false, observed: 0 }
    }

    #[test]
    fn ids_are_never_reused() {
        let mut slab = EventSlab::default();
        let a = slab.insert(dummy_event(3, 0));
        slab.remove(a);
        let b = slab.insert(dummy_event(3, 0));
        assert_ne!(a, b);
    }

    #[test]
    fn remove_of_unknown_id_is_a_no_op() {
        let mut slab = EventSlab::default();
        assert!(slab.remove(EventId::new(42)).is_none());
    }
}
