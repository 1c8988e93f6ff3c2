//! A thin wrapper over an unnamed POSIX counting semaphore (`sem_t`),
//! signalling submissions from producer threads to the single worker
//! thread.

use std::mem::MaybeUninit;
use std::time::Duration;

use crate::error::{Result, WorkerError};

pub struct Semaphore {
    raw: MaybeUninit<libc::sem_t>,
}

// `sem_t` is designed for cross-thread use; all access here goes through
// libc's own synchronization, nothing in this wrapper needs locking.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Create an unnamed, process-private semaphore with the given initial
    /// count.
    pub fn new(initial: u32) -> Result<Self> {
        let mut raw = MaybeUninit::<libc::sem_t>::uninit();
        let ret = unsafe { libc::sem_init(raw.as_mut_ptr(), 0, initial) };
        if ret != 0 {
            return Err(WorkerError::from_errno());
        }
        Ok(Self { raw })
    }

    /// Increment the count, waking one waiter if any is blocked.
    pub fn post(&self) -> Result<()> {
        let ret = unsafe { libc::sem_post(self.raw.as_ptr() as *mut _) };
        if ret != 0 {
            return Err(WorkerError::from_errno());
        }
        Ok(())
    }

    /// Wait up to `timeout` for the count to become positive, decrementing
    /// it on success. Returns `Ok(true)` if a token was acquired, `Ok(false)`
    /// on timeout. Transparently retries on `EINTR` — this crate makes no
    /// distinction between an interrupted wait and one that simply took
    /// longer, the caller only cares whether a submission is ready.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        let mut deadline = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut deadline) } != 0 {
            return Err(WorkerError::from_errno());
        }
        deadline.tv_sec += timeout.as_secs() as libc::time_t;
        deadline.tv_nsec += timeout.subsec_nanos() as libc::c_long;
        if deadline.tv_nsec >= 1_000_000_000 {
            deadline.tv_nsec -= 1_000_000_000;
            deadline.tv_sec += 1;
        }

        loop {
            let ret = unsafe { libc::sem_timedwait(self.raw.as_ptr() as *mut _, &deadline) };
            if ret == 0 {
                return Ok(true);
            }
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(-1);
            match errno {
                libc::EINTR => continue,
                libc::ETIMEDOUT => return Ok(false),
                _ => return Err(WorkerError::Os(errno)),
            }
        }
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_destroy(self.raw.as_mut_ptr());
        }
    }
}
