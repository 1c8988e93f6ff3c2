//! Timer min-heap: a `BinaryHeap` over a newtype whose `Ord` reverses the
//! natural order on absolute expiry, so the earliest deadline sorts to the
//! top. Owned outright by the single reactor thread, with lazy cancellation
//! by [`TimerId`] rather than a heap-wide rebuild on every removal.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use reactor_core::TimerId;

use crate::scheduler::Scheduler;

pub type TimerCallback = Box<dyn FnMut(&mut Scheduler) -> i32>;

pub(crate) struct TimerEntry {
    pub(crate) id: TimerId,
    pub(crate) expiry_ms: u64,
    pub(crate) callback: TimerCallback,
}

struct HeapEntry(TimerEntry);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.expiry_ms == other.0.expiry_ms && self.0.id == other.0.id
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, this makes the earliest expiry
        // (and, on a tie, the lowest id) compare greatest so it surfaces first.
        match other.0.expiry_ms.cmp(&self.0.expiry_ms) {
            Ordering::Equal => other.0.id.as_u32().cmp(&self.0.id.as_u32()),
            ord => ord,
        }
    }
}

/// Min-heap of armed timers plus lazy-cancellation bookkeeping. The
/// `Reactor` is the sole owner of every entry once `add_timer` succeeds.
#[derive(Default)]
pub(crate) struct TimerHeap {
    heap: BinaryHeap<HeapEntry>,
    cancelled: HashSet<TimerId>,
    next_id: u32,
}

impl TimerHeap {
    pub(crate) fn insert(&mut self, expiry_ms: u64, callback: TimerCallback) -> TimerId {
        let id = TimerId::new(self.next_id);
        self.next_id += 1;
        self.heap.push(HeapEntry(TimerEntry { id, expiry_ms, callback }));
        id
    }

    /// Idempotent: cancelling an id that already fired or was never armed is
    /// a no-op.
    pub(crate) fn remove(&mut self, id: TimerId) {
        self.cancelled.insert(id);
    }

    /// Pop and return the single earliest timer due at or before `now_ms`,
    /// skipping (and forgetting) any cancelled entries encountered along the
    /// way. `None` means nothing is due yet.
    pub(crate) fn pop_due(&mut self, now_ms: u64) -> Option<TimerEntry> {
        loop {
            let top_is_due = matches!(self.heap.peek(), Some(e) if e.0.expiry_ms <= now_ms);
            if !top_is_due {
                return None;
            }
            let entry = self.heap.pop().expect("peeked Some above").0;
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            if self.heap.is_empty() {
                self.cancelled.clear();
            }
            return Some(entry);
        }
    }

    /// The next deadline, if any, after dropping cancelled entries sitting
    /// at the top of the heap.
    pub(crate) fn peek_deadline_ms(&mut self) -> Option<u64> {
        loop {
            let top_id = self.heap.peek()?.0.id;
            if self.cancelled.remove(&top_id) {
                self.heap.pop();
                continue;
            }
            return self.heap.peek().map(|e| e.0.expiry_ms);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len().saturating_sub(self.cancelled.len())
    }
}
