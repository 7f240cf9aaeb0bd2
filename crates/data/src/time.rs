//! Wall-clock time with a strictly monotonic nanosecond view
//!
//! `now_ns` never returns the same value twice, across all threads: a CAS
//! loop over a process-wide atomic bumps ties to the previous value plus
//! one nanosecond. Callers rely on this to key time-ordered structures
//! without collisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

fn wall_clock_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Nanoseconds since the Unix epoch, strictly increasing across threads.
pub fn now_ns() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let mut result = wall_clock_ns();
    let mut prev = LAST.load(Ordering::Relaxed);
    loop {
        if result <= prev {
            result = prev + 1;
        }
        match LAST.compare_exchange_weak(prev, result, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return result,
            Err(current) => prev = current,
        }
    }
}

/// Milliseconds since the Unix epoch (wall clock, not monotonic).
pub fn now_ms() -> u64 {
    wall_clock_ns() / NANOS_PER_MILLI
}

/// Seconds since the Unix epoch (wall clock, not monotonic).
pub fn now_secs() -> u64 {
    wall_clock_ns() / NANOS_PER_SEC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ns_strictly_increases() {
        let mut prev = now_ns();
        for _ in 0..10_000 {
            let next = now_ns();
            assert!(next > prev, "clock must strictly increase");
            prev = next;
        }
    }

    #[test]
    fn test_now_ns_strictly_increases_across_threads() {
        use std::thread;
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..5_000).map(|_| now_ns()).collect::<Vec<u64>>()))
            .collect();
        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let len = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), len, "no two calls may observe the same nanosecond");
    }

    #[test]
    fn test_wall_clock_scales() {
        let secs = now_secs();
        let ms = now_ms();
        assert!(secs > 1_500_000_000); // after 2017
        assert!(ms / 1000 >= secs - 1);
    }
}
