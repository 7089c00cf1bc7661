//! Monotonic microsecond clock. Uses `Instant` relative to process start
//! rather than wall-clock time, matching the tutorial source's use of
//! `CLOCK_MONOTONIC` for TTL and idle-timeout arithmetic — a wall-clock
//! jump (NTP step, DST) must never move a deadline.

use std::sync::OnceLock;
use std::time::Instant;

fn start() -> Instant {
    static START: OnceLock<Instant> = OnceLock::new();
    *START.get_or_init(Instant::now)
}

pub fn now_us() -> u64 {
    start().elapsed().as_micros() as u64
}
