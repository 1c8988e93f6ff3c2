//! `select(2)` backend — three bitsets, a descriptor→event map, good for
//! small descriptor counts or platforms without `poll`/`epoll`.

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use reactor_core::flags::{interest, observed};
use reactor_core::ids::EventId;
use reactor_core::{ReactorError, Result};

use crate::backend::{check_zero_ready, Backend, Readiness, Registration};

/// Keeps a descriptor→event mapping in a `HashMap`.
pub struct SelectBackend {
    registrations: HashMap<RawFd, (EventId, u8)>,
}

impl SelectBackend {
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
        }
    }
}

impl Default for SelectBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create() -> Result<Box<dyn Backend>> {
    Ok(Box::new(SelectBackend::new()))
}

impl Backend for SelectBackend {
    fn event_register(&mut self, reg: Registration) -> Result<()> {
        if reg.interest & interest::EDGE != 0 {
            return Err(ReactorError::Invalid);
        }
        if reg.fd < 0 || reg.fd as usize >= libc::FD_SETSIZE {
            return Err(ReactorError::DescriptorRange);
        }
        if self.registrations.contains_key(&reg.fd) {
            return Err(ReactorError::AlreadyExists);
        }
        self.registrations.insert(reg.fd, (reg.id, reg.interest));
        Ok(())
    }

    fn event_unregister(&mut self, _id: EventId, fd: RawFd) -> Result<()> {
        self.registrations.remove(&fd);
        Ok(())
    }

    fn fetch_events(&mut self, timeout_ms: Option<u64>, out: &mut Vec<Readiness>) -> Result<()> {
        // All three sets start zeroed at every call.
        let (mut read_set, mut write_set, mut err_set) = unsafe {
            let mut r: libc::fd_set = std::mem::zeroed();
            let mut w: libc::fd_set = std::mem::zeroed();
            let mut e: libc::fd_set = std::mem::zeroed();
            libc::FD_ZERO(&mut r);
            libc::FD_ZERO(&mut w);
            libc::FD_ZERO(&mut e);
            (r, w, e)
        };

        let mut nfds: libc::c_int = 0;
        for (&fd, &(_, mask)) in &self.registrations {
            // Readable fds set read+error; writable fds set write+error —
            // writable fds also set the error set, independent of read.
            if mask & interest::READ != 0 {
                unsafe { libc::FD_SET(fd, &mut read_set) };
                unsafe { libc::FD_SET(fd, &mut err_set) };
            }
            if mask & interest::WRITE != 0 {
                unsafe { libc::FD_SET(fd, &mut write_set) };
                unsafe { libc::FD_SET(fd, &mut err_set) };
            }
            nfds = nfds.max(fd + 1);
        }

        let mut tv = libc::timeval { tv_sec: 0, tv_usec: 0 };
        let tv_ptr: *mut libc::timeval = match timeout_ms {
            None => std::ptr::null_mut(),
            Some(ms) => {
                tv.tv_sec = (ms / 1000) as libc::time_t;
                tv.tv_usec = ((ms % 1000) * 1000) as libc::suseconds_t;
                &mut tv
            }
        };

        let ret = unsafe { libc::select(nfds, &mut read_set, &mut write_set, &mut err_set, tv_ptr) };
        if ret < 0 {
            return Err(ReactorError::from_errno());
        }

        let mut ready_count = 0usize;
        for (&fd, &(id, _mask)) in &self.registrations {
            let mut obs = 0u8;
            if unsafe { libc::FD_ISSET(fd, &read_set) } {
                obs |= observed::READ;
            }
            if unsafe { libc::FD_ISSET(fd, &write_set) } {
                obs |= observed::WRITE;
            }
            if unsafe { libc::FD_ISSET(fd, &err_set) } {
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
        "select"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reactor_core::ids::EventId;

    #[test]
    fn rejects_edge_triggered() {
        let mut backend = SelectBackend::new();
        let reg = Registration { id: EventId::new(0), fd: 0, interest: interest::READ | interest::EDGE };
        assert!(matches!(backend.event_register(reg), Err(ReactorError::Invalid)));
    }

    #[test]
    fn rejects_duplicate_descriptor() {
        let mut backend = SelectBackend::new();
        let reg = Registration { id: EventId::new(0), fd: 3, interest: interest::READ };
        backend.event_register(reg).unwrap();
        assert!(matches!(backend.event_register(reg), Err(ReactorError::AlreadyExists)));
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut backend = SelectBackend::new();
        assert!(backend.event_unregister(EventId::new(0), 7).is_ok());
    }

    #[test]
    fn readable_pipe_end_is_reported() {
        let mut fds = [0 as RawFd; 2];
        unsafe { assert_eq!(libc::pipe(fds.as_mut_ptr()), 0) };
        let [r, w] = fds;
        unsafe { libc::write(w, b"x".as_ptr() as *const _, 1) };

        let mut backend = SelectBackend::new();
        backend
            .event_register(Registration { id: EventId::new(1), fd: r, interest: interest::READ })
            .unwrap();

        let mut out = Vec::new();
        backend.fetch_events(Some(200), &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].observed & observed::READ, observed::READ);

        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

}
