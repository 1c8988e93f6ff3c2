//! # reactor-backends — readiness-multiplexing backends
//!
//! Three implementations of the same [`backend::Backend`] trait
//! (`select`/`poll`/`epoll`), installed into a process-wide name→factory
//! [`registry`] that the facade reactor crate resolves by name — one place to
//! go from a backend name to a concrete implementation without callers
//! needing to know all three exist.

pub mod backend;
pub mod poll;
pub mod registry;
pub mod select;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod epoll;
    }
}

pub use backend::{Backend, Readiness, Registration};
pub use registry::install_builtin_backends;
