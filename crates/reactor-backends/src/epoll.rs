//! `epoll(7)` backend — edge- and level-triggered readiness via the kernel's
//! own interest list, with the `EventId` carried as the epoll cookie so
//! `fetch_events` needs no descriptor→event lookup.

use std::collections::HashSet;
use std::os::unix::io::RawFd;

use reactor_core::flags::{interest, observed};
use reactor_core::ids::EventId;
use reactor_core::{ReactorError, Result};

use crate::backend::{check_zero_ready, Backend, Readiness, Registration};

fn to_epoll_events(mask: u8) -> u32 {
    let mut events = 0u32;
    if mask & interest::READ != 0 {
        events |= libc::EPOLLIN as u32;
    }
    if mask & interest::WRITE != 0 {
        events |= libc::EPOLLOUT as u32;
    }
    if mask & interest::EDGE != 0 {
        events |= libc::EPOLLET as u32;
    }
    events
}

pub struct EpollBackend {
    epfd: RawFd,
    registered: HashSet<RawFd>,
    results: Vec<libc::epoll_event>,
}

impl EpollBackend {
    pub fn new() -> Result<Self> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(ReactorError::from_errno());
        }
        Ok(Self {
            epfd,
            registered: HashSet::new(),
            results: Vec::new(),
        })
    }
}

pub fn create() -> Result<Box<dyn Backend>> {
    Ok(Box::new(EpollBackend::new()?))
}

impl Backend for EpollBackend {
    fn event_register(&mut self, reg: Registration) -> Result<()> {
        if self.registered.contains(&reg.fd) {
            return Err(ReactorError::AlreadyExists);
        }
        let mut ev = libc::epoll_event {
            events: to_epoll_events(reg.interest),
            u64: reg.id.as_u32() as u64,
        };
        let ret = unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, reg.fd, &mut ev) };
        if ret < 0 {
            return Err(ReactorError::from_errno());
        }
        self.registered.insert(reg.fd);
        self.results
            .resize(self.registered.len().max(1), unsafe { std::mem::zeroed() });
        Ok(())
    }

    fn event_unregister(&mut self, _id: EventId, fd: RawFd) -> Result<()> {
        if self.registered.remove(&fd) {
            unsafe {
                libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut());
            }
        }
        Ok(())
    }

    fn fetch_events(&mut self, timeout_ms: Option<u64>, out: &mut Vec<Readiness>) -> Result<()> {
        if self.results.is_empty() {
            self.results.resize(1, unsafe { std::mem::zeroed() });
        }
        let timeout: libc::c_int = match timeout_ms {
            None => -1,
            Some(ms) => ms.min(libc::c_int::MAX as u64) as libc::c_int,
        };

        let ret = unsafe {
            libc::epoll_wait(
                self.epfd,
                self.results.as_mut_ptr(),
                self.results.len() as libc::c_int,
                timeout,
            )
        };
        if ret < 0 {
            return Err(ReactorError::from_errno());
        }

        let ret = ret as usize;
        for ev in &self.results[..ret] {
            let mut obs = 0u8;
            if ev.events & libc::EPOLLIN as u32 != 0 {
                obs |= observed::READ;
            }
            if ev.events & libc::EPOLLOUT as u32 != 0 {
                obs |= observed::WRITE;
            }
            if ev.events & libc::EPOLLRDHUP as u32 != 0 {
                obs |= observed::EOF;
            }
            if ev.events & (libc::EPOLLERR as u32 | libc::EPOLLHUP as u32) != 0 {
                obs |= observed::ERROR;
            }
            if obs != 0 {
                out.push(Readiness { id: EventId::new(ev.u64 as u32), observed: obs });
            }
        }

        check_zero_ready(ret, timeout_ms)
    }

    fn name(&self) -> &'static str {
        "epoll"
    }
}

impl Drop for EpollBackend {
    fn drop(&mut self) {
        if self.epfd >= 0 {
            unsafe {
                libc::close(self.epfd);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_triggered_round_trips_through_epollet() {
        let mut backend = EpollBackend::new().unwrap();
        let mut fds = [0 as RawFd; 2];
        unsafe { assert_eq!(libc::pipe(fds.as_mut_ptr()), 0) };
        let [r, w] = fds;

        backend
            .event_register(Registration {
                id: EventId::new(9),
                fd: r,
                interest: interest::READ | interest::EDGE,
            })
            .unwrap();
        unsafe {
            libc::write(w, b"x".as_ptr() as *const _, 1);
        }

        let mut out = Vec::new();
        backend.fetch_events(Some(200), &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, EventId::new(9));
        assert_eq!(out[0].observed & observed::READ, observed::READ);

        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn rejects_duplicate_descriptor() {
        let mut backend = EpollBackend::new().unwrap();
        let mut fds = [0 as RawFd; 2];
        unsafe { assert_eq!(libc::pipe(fds.as_mut_ptr()), 0) };
        let [r, w] = fds;
        let reg = Registration { id: EventId::new(0), fd: r, interest: interest::READ };
        backend.event_register(reg).unwrap();
        assert!(matches!(backend.event_register(reg), Err(ReactorError::AlreadyExists)));
        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn unregister_then_refetch_sees_nothing() {
        let mut backend = EpollBackend::new().unwrap();
        let mut fds = [0 as RawFd; 2];
        unsafe { assert_eq!(libc::pipe(fds.as_mut_ptr()), 0) };
        let [r, w] = fds;
        backend
            .event_register(Registration { id: EventId::new(1), fd: r, interest: interest::READ })
            .unwrap();
        unsafe {
            libc::write(w, b"x".as_ptr() as *const _, 1);
        }
        backend.event_unregister(EventId::new(1), r).unwrap();

        let mut out = Vec::new();
        assert!(backend.fetch_events(Some(50), &mut out).is_ok());
        assert!(out.is_empty());

        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }
}
