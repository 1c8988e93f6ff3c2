//! The single background thread offloading blocking read/write/fsync calls.

use std::os::unix::io::RawFd;
use std::os::unix::thread::JoinHandleExt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_queue::{ArrayQueue, SegQueue};

use crate::error::{Result, WorkerError};
use crate::eventfd::EventCounter;
use crate::request::{Tag, WorkerRequest};
use crate::semaphore::Semaphore;

/// How long the worker blocks on the submission semaphore when the overflow
/// queue is empty — long enough to avoid busy-waking, short enough that
/// `shutdown` always returns promptly.
const IDLE_WAIT: Duration = Duration::from_millis(50);
/// Shorter bound used whenever the overflow queue is non-empty, so overflow
/// keeps draining onto the completion ring even with no fresh submissions.
const DRAIN_WAIT: Duration = Duration::from_millis(2);

struct Shared {
    submission: ArrayQueue<WorkerRequest>,
    completion: ArrayQueue<WorkerRequest>,
    overflow: SegQueue<WorkerRequest>,
    semaphore: Semaphore,
    event_counter: EventCounter,
    publish_flags: u8,
    shutdown: AtomicBool,
    /// Sticky error code from the worker thread — set if the semaphore wait
    /// itself ever fails for a reason other than timeout; surfaced to the
    /// consumer via [`Worker::sticky_error`].
    sticky_error: AtomicI32,
    /// Count of requests submitted but not yet drained by a consumer via
    /// [`Worker::try_recv_completions`]. Bounds how many requests may be in
    /// flight across the submission ring, worker execution, completion ring,
    /// and overflow queue combined — the submission ring's own occupancy
    /// drops the instant the worker thread pops a request, well before its
    /// completion is consumer-visible, so it cannot stand in for this count.
    outstanding: AtomicUsize,
    /// Same bound the submission/completion rings were constructed with;
    /// `outstanding` is capped against this in [`Worker::submit`].
    depth: usize,
}

/// A background thread serving blocking I/O for one process.
pub struct Worker {
    shared: Arc<Shared>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// `depth` is rounded up to a power of two with a floor of 2. `flags`
    /// selects which completion tags get published (`flags::publish`).
    pub fn create(depth: usize, publish_flags: u8) -> Result<Self> {
        let depth = depth.max(2).next_power_of_two();
        let semaphore = Semaphore::new(0)?;
        let event_counter = EventCounter::create()?;

        let shared = Arc::new(Shared {
            submission: ArrayQueue::new(depth),
            completion: ArrayQueue::new(depth),
            overflow: SegQueue::new(),
            semaphore,
            event_counter,
            publish_flags,
            shutdown: AtomicBool::new(false),
            sticky_error: AtomicI32::new(0),
            outstanding: AtomicUsize::new(0),
            depth,
        });

        let loop_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("reactor-worker".into())
            .spawn(move || worker_loop(loop_shared))
            .map_err(|_| WorkerError::NoMemory)?;

        Ok(Self { shared, thread: Some(thread) })
    }

    /// Enqueue a request onto the submission ring. Fails with `WouldBlock`
    /// if `depth` requests are already outstanding (submitted but not yet
    /// drained by a consumer) — not merely if the submission ring itself is
    /// full, since the worker thread empties that ring well before a
    /// completion becomes consumer-visible. On success, posts the
    /// submission semaphore exactly once.
    pub fn submit(&self, request: WorkerRequest) -> Result<()> {
        loop {
            let current = self.shared.outstanding.load(Ordering::Acquire);
            if current >= self.shared.depth {
                return Err(WorkerError::WouldBlock);
            }
            if self
                .shared
                .outstanding
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }

        if self.shared.submission.push(request).is_err() {
            self.shared.outstanding.fetch_sub(1, Ordering::AcqRel);
            return Err(WorkerError::WouldBlock);
        }
        self.shared.semaphore.post()
    }

    /// The descriptor a poller watches for readability; it carries the
    /// count of completions available.
    pub fn event_fd(&self) -> RawFd {
        self.shared.event_counter.fd()
    }

    /// Drain up to `max` available completions from the completion ring
    /// into `buf`. Returns the number drained. Each drained request frees
    /// one outstanding slot for [`Worker::submit`].
    pub fn try_recv_completions(&self, buf: &mut Vec<WorkerRequest>, max: usize) -> usize {
        let mut n = 0;
        while n < max {
            match self.shared.completion.pop() {
                Some(req) => {
                    buf.push(req);
                    n += 1;
                }
                None => break,
            }
        }
        if n > 0 {
            self.shared.outstanding.fetch_sub(n, Ordering::AcqRel);
        }
        n
    }

    /// Non-zero if the worker thread's own wait loop ever failed for a
    /// reason other than a timeout.
    pub fn sticky_error(&self) -> i32 {
        self.shared.sticky_error.load(Ordering::Acquire)
    }

    /// Cancel and join the worker thread, then invoke `release` exactly
    /// once for every request that had not yet produced a completion
    /// visible to a consumer: everything still queued on the submission
    /// ring (never started) and everything sitting in the overflow queue
    /// (completed, but not yet placed on the completion ring). Requests
    /// already on the completion ring are left there — they are visible to
    /// the consumer and remain drainable via [`Worker::try_recv_completions`]
    /// after `shutdown` returns. Idempotent: a second call is a no-op.
    pub fn shutdown<F: FnMut(WorkerRequest)>(&mut self, mut release: F) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        self.shared.shutdown.store(true, Ordering::Release);

        // read/write/fsync are POSIX cancellation points, so a thread
        // blocked on genuinely slow I/O is kicked out immediately instead of
        // waiting for it to complete on its own — mirrors the original C
        // worker's `pthread_cancel(iothread->worker_thread)`.
        let tid = handle.as_pthread_t();
        unsafe {
            libc::pthread_cancel(tid);
        }
        let _ = handle.join();

        while let Some(req) = self.shared.submission.pop() {
            release(req);
        }
        while let Some(req) = self.shared.overflow.pop() {
            release(req);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown(|_| {});
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        let wait = if shared.overflow.is_empty() { IDLE_WAIT } else { DRAIN_WAIT };
        match shared.semaphore.wait_timeout(wait) {
            Ok(true) => {
                if let Some(mut req) = shared.submission.pop() {
                    execute(&mut req);
                    if req.publish_bit() & shared.publish_flags != 0 {
                        publish(&shared, req);
                    }
                }
            }
            Ok(false) => {}
            Err(e) => shared.sticky_error.store(errno_of(&e), Ordering::Release),
        }

        drain_overflow(&shared);
    }
}

fn publish(shared: &Shared, req: WorkerRequest) {
    if let Err(req) = shared.completion.push(req) {
        shared.overflow.push(req);
    }
    let _ = shared.event_counter.notify();
}

/// Move overflow entries onto the completion ring, FIFO, as room opens up.
/// Checks capacity before popping so an item is never taken off the
/// overflow queue only to be pushed back — a pop-then-requeue would invert
/// its order relative to the items behind it.
fn drain_overflow(shared: &Shared) {
    while shared.completion.len() < shared.completion.capacity() {
        match shared.overflow.pop() {
            Some(req) => {
                let _ = shared.completion.push(req);
                let _ = shared.event_counter.notify();
            }
            None => break,
        }
    }
}

fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(-1)
}

fn errno_of(e: &WorkerError) -> i32 {
    match e {
        WorkerError::Os(n) | WorkerError::Io(n) => *n,
        _ => -1,
    }
}

/// Perform the blocking syscall a request names, retrying on `EINTR`.
fn execute(req: &mut WorkerRequest) {
    match req.tag() {
        Tag::Read => loop {
            let len = req.size();
            let ret = unsafe { libc::read(req.fd(), req.buffer_mut().as_mut_ptr() as *mut _, len) };
            if ret < 0 {
                let errno = last_errno();
                if errno == libc::EINTR {
                    continue;
                }
                req.set_error(errno);
                req.set_size(0);
                break;
            }
            req.set_size(ret as usize);
            req.set_error(0);
            break;
        },
        Tag::Write => {
            let total = req.size();
            let mut written = 0usize;
            loop {
                if written >= total {
                    req.set_error(0);
                    break;
                }
                let ptr = unsafe { req.buffer().as_ptr().add(written) };
                let ret = unsafe { libc::write(req.fd(), ptr as *const _, total - written) };
                if ret < 0 {
                    let errno = last_errno();
                    if errno == libc::EINTR {
                        continue;
                    }
                    req.set_error(errno);
                    break;
                }
                written += ret as usize;
            }
            req.set_size(written);
        }
        Tag::Sync => loop {
            let ret = unsafe { libc::fsync(req.fd()) };
            if ret == 0 {
                req.set_error(0);
                break;
            }
            let errno = last_errno();
            if errno == libc::EINTR {
                continue;
            }
            req.set_error(errno);
            break;
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::publish;
    use std::os::unix::io::RawFd;
    use std::time::{Duration, Instant};

    fn wait_for_completions(worker: &Worker, want: usize, timeout: Duration) -> Vec<WorkerRequest> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        while out.len() < want && Instant::now() < deadline {
            let fd = worker.event_fd();
            let mut pfd = libc::pollfd { fd, events: libc::POLLIN, revents: 0 };
            unsafe {
                libc::poll(&mut pfd, 1, 20);
            }
            worker.try_recv_completions(&mut out, want - out.len());
        }
        out
    }

    fn pipe() -> (RawFd, RawFd) {
        let mut fds = [0 as RawFd; 2];
        unsafe { assert_eq!(libc::pipe(fds.as_mut_ptr()), 0) };
        (fds[0], fds[1])
    }

    #[test]
    fn read_write_round_trip_through_a_pipe() {
        let (r, w) = pipe();
        let mut worker = Worker::create(8, publish::ALL).unwrap();

        unsafe {
            libc::write(w, b"abcd".as_ptr() as *const _, 4);
        }
        worker.submit(WorkerRequest::read(r, 256)).unwrap();
        let mut done = wait_for_completions(&worker, 1, Duration::from_secs(2));
        let completed = done.pop().unwrap();
        assert_eq!(completed.error(), 0);
        assert_eq!(completed.size(), 4);
        assert_eq!(&completed.into_buffer()[..4], b"abcd");

        let (r2, w2) = pipe();
        worker.submit(WorkerRequest::write(w2, b"abcd".to_vec())).unwrap();
        let mut done = wait_for_completions(&worker, 1, Duration::from_secs(2));
        let completed = done.pop().unwrap();
        assert_eq!(completed.error(), 0);
        assert_eq!(completed.size(), 4);

        let mut buf = [0u8; 4];
        unsafe {
            libc::read(r2, buf.as_mut_ptr() as *mut _, 4);
        }
        assert_eq!(&buf, b"abcd");

        worker.shutdown(|_| {});
        unsafe {
            libc::close(r);
            libc::close(w);
            libc::close(r2);
            libc::close(w2);
        }
    }

    #[test]
    fn depth_limits_outstanding_submissions() {
        // Outstanding count (not submission-ring occupancy) gates
        // `submit`, so this holds deterministically regardless of whether
        // the worker thread has even been scheduled yet. Data is queued
        // afterward so the blocked reads (and the final `shutdown` join)
        // can complete.
        let mut worker = Worker::create(2, 0).unwrap();
        let (r1, w1) = pipe();
        let (r2, w2) = pipe();
        let (r3, w3) = pipe();

        worker.submit(WorkerRequest::read(r1, 8)).unwrap();
        worker.submit(WorkerRequest::read(r2, 8)).unwrap();
        assert!(matches!(
            worker.submit(WorkerRequest::read(r3, 8)),
            Err(WorkerError::WouldBlock)
        ));

        unsafe {
            libc::write(w1, b"x".as_ptr() as *const _, 1);
            libc::write(w2, b"x".as_ptr() as *const _, 1);
        }
        worker.shutdown(|_| {});
        unsafe {
            libc::close(r1);
            libc::close(w1);
            libc::close(r2);
            libc::close(w2);
            libc::close(r3);
            libc::close(w3);
        }
    }

    #[test]
    fn overflow_then_drain_then_submit_succeeds() {
        // Literal sequence: depth = 2, two reads complete without being
        // drained; the worker publishes both, the event-counter reads as 2,
        // a third submit fails until both completions are drained, after
        // which it succeeds.
        let (r1, w1) = pipe();
        let (r2, w2) = pipe();
        let (r3, w3) = pipe();
        unsafe {
            libc::write(w1, b"a".as_ptr() as *const _, 1);
            libc::write(w2, b"b".as_ptr() as *const _, 1);
        }

        let mut worker = Worker::create(2, publish::SIGREAD).unwrap();
        worker.submit(WorkerRequest::read(r1, 1)).unwrap();
        worker.submit(WorkerRequest::read(r2, 1)).unwrap();

        // Poll observes readiness without consuming the counter; accumulate
        // raw reads of it until both completions have been published.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut counted = 0u64;
        while counted < 2 && Instant::now() < deadline {
            let fd = worker.event_fd();
            let mut pfd = libc::pollfd { fd, events: libc::POLLIN, revents: 0 };
            unsafe {
                libc::poll(&mut pfd, 1, 20);
            }
            if pfd.revents & libc::POLLIN != 0 {
                let mut val: u64 = 0;
                let n = unsafe { libc::read(fd, &mut val as *mut u64 as *mut _, 8) };
                if n == 8 {
                    counted += val;
                }
            }
        }
        assert_eq!(counted, 2);

        // Both completions are sitting undrained on the completion ring —
        // outstanding is at depth, so a third submit must fail regardless of
        // how long it's given.
        assert!(matches!(
            worker.submit(WorkerRequest::read(r3, 1)),
            Err(WorkerError::WouldBlock)
        ));

        let mut done = Vec::new();
        worker.try_recv_completions(&mut done, 2);
        assert_eq!(done.len(), 2);
        let mut bytes: Vec<u8> = done.iter().map(|req| req.buffer()[0]).collect();
        bytes.sort_unstable();
        assert_eq!(bytes, vec![b'a', b'b']);

        // Draining freed both outstanding slots — the same request now
        // succeeds immediately.
        worker.submit(WorkerRequest::read(r3, 1)).unwrap();

        worker.shutdown(|_| {});
        for fd in [r1, w1, r2, w2, r3, w3] {
            unsafe {
                libc::close(fd);
            }
        }
    }

    #[test]
    fn shutdown_accounts_for_every_submission() {
        // Non-blocking fd: whichever side of the race wins (released still
        // queued, or executed and published before shutdown joined), the
        // worker thread never blocks on the syscall itself.
        let (r, w) = pipe();
        unsafe {
            libc::fcntl(r, libc::F_SETFL, libc::O_NONBLOCK);
        }
        let mut worker = Worker::create(4, publish::SIGREAD).unwrap();
        worker.submit(WorkerRequest::read(r, 8)).unwrap();

        let mut released = Vec::new();
        worker.shutdown(|req| released.push(req));

        let mut completions = Vec::new();
        worker.try_recv_completions(&mut completions, 4);

        assert_eq!(released.len() + completions.len(), 1);
        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn shutdown_interrupts_a_thread_blocked_in_read() {
        // Blocking fd with no writer: the worker thread is parked inside the
        // `read(2)` syscall itself, not merely waiting on the semaphore.
        // Without `pthread_cancel` this would hang until a byte arrives —
        // which here is never.
        let (r, w) = pipe();
        let mut worker = Worker::create(2, publish::SIGREAD).unwrap();
        worker.submit(WorkerRequest::read(r, 8)).unwrap();

        // Give the worker thread a chance to actually enter the blocking
        // read before shutdown races it.
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        worker.shutdown(|_| {});
        assert!(start.elapsed() < Duration::from_secs(1));

        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }
}
