//! I/O worker error types.
//!
//! Deliberately separate from `reactor-core::ReactorError` — this crate has
//! no dependency on `reactor-core` and is usable as a standalone offload
//! thread independent of the reactor; the reactor happens to integrate with
//! it, but it is not a reactor-only type.

use std::fmt;

#[derive(Debug)]
pub enum WorkerError {
    /// Argument was invalid (e.g. a zero-length write request).
    Invalid,
    /// An OS-level call failed; the errno is carried when known.
    Io(i32),
    /// The submission ring has no room right now.
    WouldBlock,
    /// Allocation or OS resource creation (thread, semaphore, eventfd) failed.
    NoMemory,
    /// Raw OS errno not otherwise categorized above.
    Os(i32),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid argument"),
            Self::Io(e) => write!(f, "I/O error: errno {}", e),
            Self::WouldBlock => write!(f, "would block"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for WorkerError {}

pub type Result<T> = std::result::Result<T, WorkerError>;

impl WorkerError {
    /// Build from the current `errno`, as set by a just-failed libc call.
    pub fn from_errno() -> Self {
        Self::Os(std::io::Error::last_os_error().raw_os_error().unwrap_or(-1))
    }
}
