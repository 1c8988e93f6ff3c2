//! Opaque handles identifying reactor-owned events and timers.
//!
//! The reactor owns every `Event`/`Timer` it installs; callers only ever see a
//! small copyable handle, never a pointer into reactor storage. `u32::MAX` is
//! reserved as a sentinel so a handle can be stored in a `Default`-initialized
//! slot before anything has been registered.

use core::fmt;

macro_rules! handle_type {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            pub const NONE: $name = $name(u32::MAX);

            #[inline]
            pub const fn new(slot: u32) -> Self {
                $name(slot)
            }

            #[inline]
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn is_none(self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::NONE
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_none() {
                    write!(f, concat!(stringify!($name), "(NONE)"))
                } else {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                }
            }
        }
    };
}

handle_type!(EventId);
handle_type!(TimerId);
