//! Reactor error types.

use std::fmt;

#[derive(Debug)]
pub enum ReactorError {
    /// Argument or backend state was invalid for the requested operation.
    Invalid,
    /// An OS-level I/O call failed; the errno is carried when known.
    Io(i32),
    /// A duplicate registration (backend name, descriptor) was attempted.
    AlreadyExists,
    /// A bounded ring or table has no room for the request right now.
    WouldBlock,
    /// Allocation failed.
    NoMemory,
    /// A descriptor number is outside what this backend can represent.
    DescriptorRange,
    /// Backend reported a ready count that did not match what it actually marked.
    CountMismatch,
    /// No backend is registered under the requested name.
    NoSuchBackend,
    /// Raw OS errno not otherwise categorized above.
    Os(i32),
}

impl fmt::Display for ReactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid argument"),
            Self::Io(e) => write!(f, "I/O error: errno {}", e),
            Self::AlreadyExists => write!(f, "already registered"),
            Self::WouldBlock => write!(f, "would block"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::DescriptorRange => write!(f, "descriptor out of backend range"),
            Self::CountMismatch => write!(f, "ready count did not match marked events"),
            Self::NoSuchBackend => write!(f, "no such backend"),
            Self::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for ReactorError {}

pub type Result<T> = std::result::Result<T, ReactorError>;

impl ReactorError {
    /// Build from the current `errno`, as set by a just-failed libc call.
    pub fn from_errno() -> Self {
        Self::Os(std::io::Error::last_os_error().raw_os_error().unwrap_or(-1))
    }
}
