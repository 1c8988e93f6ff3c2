//! `poll(2)` backend — a dense array of polling records in registration
//! order, plus a descriptor→event mapping.

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use reactor_core::flags::{interest, observed};
use reactor_core::ids::EventId;
use reactor_core::{ReactorError, Result};

use crate::backend::{check_zero_ready, Backend, Readiness, Registration};

fn to_poll_events(mask: u8) -> libc::c_short {
    let mut events = 0;
    if mask & interest::READ != 0 {
        events |= libc::POLLIN;
    }
    if mask & interest::WRITE != 0 {
        events |= libc::POLLOUT;
    }
    events as libc::c_short
}

/// Keeps `libc::pollfd` entries densely packed in registration order — the
/// shape `libc::poll` itself wants — alongside a descriptor→`EventId` map
/// used only to rebuild the dense array on `unregister` — O(n) unregister
/// is acceptable given typical fd counts.
pub struct PollBackend {
    polls: Vec<libc::pollfd>,
    registrations: HashMap<RawFd, (EventId, u8)>,
}

impl PollBackend {
    pub fn new() -> Self {
        Self {
            polls: Vec::new(),
            registrations: HashMap::new(),
        }
    }

    /// Rebuild the dense `pollfd` array from the registration map on every
    /// `unregister`, so every live mapping contributes its own actual
    /// descriptor and interest rather than leaving a stale or sentinel
    /// entry sitting in a slot.
    fn rebuild(&mut self) {
        self.polls.clear();
        self.polls.reserve(self.registrations.len());
        for (&fd, &(_, mask)) in &self.registrations {
            self.polls.push(libc::pollfd {
                fd,
                events: to_poll_events(mask),
                revents: 0,
            });
        }
    }
}

impl Default for PollBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create() -> Result<Box<dyn Backend>> {
    Ok(Box::new(PollBackend::new()))
}

const KNOWN_REVENTS: libc::c_short =
    (libc::POLLIN | libc::POLLOUT | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) as libc::c_short;

impl Backend for PollBackend {
    fn event_register(&mut self, reg: Registration) -> Result<()> {
        if reg.interest & interest::EDGE != 0 {
            return Err(ReactorError::Invalid);
        }
        if self.registrations.contains_key(&reg.fd) {
            return Err(ReactorError::AlreadyExists);
        }
        self.registrations.insert(reg.fd, (reg.id, reg.interest));
        self.polls.push(libc::pollfd {
            fd: reg.fd,
            events: to_poll_events(reg.interest),
            revents: 0,
        });
        Ok(())
    }

    fn event_unregister(&mut self, _id: EventId, fd: RawFd) -> Result<()> {
        if self.registrations.remove(&fd).is_some() {
            self.rebuild();
        }
        Ok(())
    }

    fn fetch_events(&mut self, timeout_ms: Option<u64>, out: &mut Vec<Readiness>) -> Result<()> {
        let timeout: libc::c_int = match timeout_ms {
            None => -1,
            Some(ms) => ms.min(libc::c_int::MAX as u64) as libc::c_int,
        };

        let ret = unsafe { libc::poll(self.polls.as_mut_ptr(), self.polls.len() as libc::nfds_t, timeout) };
        if ret < 0 {
            return Err(ReactorError::from_errno());
        }

        let mut ready_count = 0usize;
        for pfd in &self.polls {
            if pfd.revents == 0 {
                continue;
            }
            if pfd.revents & !KNOWN_REVENTS != 0 {
                return Err(ReactorError::Io(libc::EIO));
            }
            let (id, _mask) = *self
                .registrations
                .get(&pfd.fd)
                .expect("poll returned revents for an unregistered fd");

            let mut obs = 0u8;
            if pfd.revents & libc::POLLIN != 0 {
                obs |= observed::READ;
            }
            if pfd.revents & libc::POLLOUT != 0 {
                obs |= observed::WRITE;
            }
            if pfd.revents & libc::POLLHUP != 0 {
                obs |= observed::EOF;
            }
            if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
                obs |= observed::ERROR;
            }
            if obs != 0 {
                out.push(Readiness { id, observed: obs });
                ready_count += 1;
            }
        }

        check_zero_ready(ready_count, timeout_ms)
    }

    fn name(&self) -> &'static str {
        "poll"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_edge_triggered() {
        let mut backend = PollBackend::new();
        let reg = Registration { id: EventId::new(0), fd: 0, interest: interest::READ | interest::EDGE };
        assert!(matches!(backend.event_register(reg), Err(ReactorError::Invalid)));
    }

    #[test]
    fn rejects_duplicate_descriptor() {
        let mut backend = PollBackend::new();
        let reg = Registration { id: EventId::new(0), fd: 3, interest: interest::READ };
        backend.event_register(reg).unwrap();
        assert!(matches!(backend.event_register(reg), Err(ReactorError::AlreadyExists)));
    }

    #[test]
    fn unregister_rebuilds_with_live_descriptors_only() {
        let mut fds = [0 as RawFd; 2];
        unsafe { assert_eq!(libc::pipe(fds.as_mut_ptr()), 0) };
        let [r1, w1] = fds;
        let mut fds2 = [0 as RawFd; 2];
        unsafe { assert_eq!(libc::pipe(fds2.as_mut_ptr()), 0) };
        let [r2, w2] = fds2;

        let mut backend = PollBackend::new();
        backend
            .event_register(Registration { id: EventId::new(1), fd: r1, interest: interest::READ })
            .unwrap();
        backend
            .event_register(Registration { id: EventId::new(2), fd: r2, interest: interest::READ })
            .unwrap();
        backend.event_unregister(EventId::new(1), r1).unwrap();

        assert_eq!(backend.polls.len(), 1);
        assert_eq!(backend.polls[0].fd, r2);

        unsafe {
            libc::write(w2, b"x".as_ptr() as *const _, 1);
        }
        let mut out = Vec::new();
        backend.fetch_events(Some(200), &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, EventId::new(2));

        unsafe {
            libc::close(r1);
            libc::close(w1);
            libc::close(r2);
            libc::close(w2);
        }
    }
}
