//! Completion publish-interest bits — SIGREAD, SIGWRITE, SIGSYNC, selecting
//! which tags get published. Kept local to this crate rather than shared
//! with `reactor-core::flags::publish`, since `reactor-worker` carries no
//! dependency on `reactor-core` by design.

pub mod publish {
    /// Publish completions for `Tag::Read` requests.
    pub const SIGREAD: u8 = 1 << 0;
    /// Publish completions for `Tag::Write` requests.
    pub const SIGWRITE: u8 = 1 << 1;
    /// Publish completions for `Tag::Sync` requests.
    pub const SIGSYNC: u8 = 1 << 2;
    pub const ALL: u8 = SIGREAD | SIGWRITE | SIGSYNC;
}
