//! `EventCounter` — the worker's completion-notification descriptor. Backed
//! by Linux `eventfd(2)`: reads return and clear the accumulated
//! notification count, writes add to it. The worker is the sole writer;
//! `reactor-backends` (or a test) is the reader.

use std::os::unix::io::RawFd;

use crate::error::{Result, WorkerError};

pub struct EventCounter {
    fd: RawFd,
}

impl EventCounter {
    /// Create a new, process-owned eventfd counter starting at zero.
    pub fn create() -> Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(WorkerError::from_errno());
        }
        Ok(Self { fd })
    }

    /// The raw descriptor a poller (the reactor's backend, or any other
    /// readiness multiplexer) watches for readability.
    #[inline]
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Add one to the counter, waking anything blocked on its readability.
    /// Multiple calls between consumer reads coalesce into a single counter
    /// value (standard eventfd semantics) — this is intentional: the worker
    /// calls this once per published completion, and a consumer that has
    /// fallen behind simply observes a larger count on its next read.
    pub fn notify(&self) -> Result<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(self.fd, &val as *const u64 as *const libc::c_void, std::mem::size_of::<u64>())
        };
        if ret < 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(-1);
            // EAGAIN means the 64-bit counter is within one of overflowing,
            // which can only happen after ~2^64 outstanding notifications —
            // in practice unreachable, but harmless to swallow: a pending
            // notification is already guaranteed.
            if errno == libc::EAGAIN {
                return Ok(());
            }
            return Err(WorkerError::Os(errno));
        }
        Ok(())
    }

    /// Read and clear the accumulated count. Returns `Ok(0)` if nothing has
    /// been notified since the last read (`EAGAIN` on the non-blocking fd) —
    /// callers poll this descriptor for readability first in the common
    /// case.
    pub fn try_read_count(&self) -> Result<u64> {
        let mut val: u64 = 0;
        let ret = unsafe {
            libc::read(self.fd, &mut val as *mut u64 as *mut libc::c_void, std::mem::size_of::<u64>())
        };
        if ret < 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(-1);
            if errno == libc::EAGAIN {
                return Ok(0);
            }
            return Err(WorkerError::Os(errno));
        }
        Ok(val)
    }
}

impl Drop for EventCounter {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}
