//! A standalone background thread that offloads blocking `read`/`write`/
//! `fsync` calls off of latency-sensitive threads.
//!
//! This crate has no dependency on `reactor-core` or `reactor-backends`; it
//! is usable on its own as a bounded offload thread with a pollable
//! completion descriptor, and the facade `reactor` crate wires it into the
//! event loop as one more readiness source.

pub mod error;
pub mod eventfd;
pub mod flags;
pub mod request;
pub mod semaphore;
pub mod worker;

pub use error::{Result, WorkerError};
pub use eventfd::EventCounter;
pub use request::{Tag, WorkerRequest};
pub use worker::Worker;
