//! Monotonic clock, read as an unsigned millisecond count.
//!
//! The reactor caches this at well-defined points (start of iteration, after
//! `fetch_events`) instead of reading it on every comparison — the clock
//! itself stays a thin, cheap wrapper so callers can read it freely when they
//! do need a fresh sample.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// The arbitrary origin all millisecond counts are relative to. Fixed at the
/// first call in the process; never moves afterward, so differences between
/// two `monotonic_ms()` reads are always meaningful regardless of call order.
fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

/// Current monotonic time in milliseconds since an arbitrary process-local
/// origin. One cycle of `u64` ms is about 5 * 10^8 years — wraparound is not
/// a concern.
pub fn monotonic_ms() -> u64 {
    epoch().elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn advances_monotonically() {
        let a = monotonic_ms();
        sleep(Duration::from_millis(5));
        let b = monotonic_ms();
        assert!(b >= a);
    }
}
