//! Interest and observed bit layout, stable for API users.
//!
//! Plain `u8` bit constants, grouped into modules by concern rather than
//! pulled in through `bitflags` — the bits are few and the layout is part of
//! the public contract.

/// Bits a caller sets on `add_event` to describe what it wants to hear about.
pub mod interest {
    /// Wake when the descriptor is readable.
    pub const READ: u8 = 1 << 0;
    /// Wake when the descriptor is writable.
    pub const WRITE: u8 = 1 << 1;
    /// Request edge-triggered delivery. Only `epoll` can honor this.
    pub const EDGE: u8 = 1 << 2;
    /// Leave the descriptor in blocking mode. Without this bit, `add_event`
    /// switches the descriptor to non-blocking before registering it.
    pub const BLOCKING: u8 = 1 << 3;
}

/// Bits a backend sets on an event before enqueuing it as ready.
///
/// READ/WRITE share bit positions with [`interest`] by design — an observed
/// READ bit answers the interest READ bit. EOF/ERROR are observed-only: no
/// caller ever asks to be told about them, backends report them whenever
/// they happen to be visible in the readiness result.
pub mod observed {
    pub const READ: u8 = 1 << 0;
    pub const WRITE: u8 = 1 << 1;
    pub const EOF: u8 = 1 << 2;
    pub const ERROR: u8 = 1 << 3;
}

/// Bits selecting which worker completion tags get published to the
/// completion ring.
pub mod publish {
    pub const SIGREAD: u8 = 1 << 0;
    pub const SIGWRITE: u8 = 1 << 1;
    pub const SIGSYNC: u8 = 1 << 2;
    pub const ALL: u8 = SIGREAD | SIGWRITE | SIGSYNC;
}
