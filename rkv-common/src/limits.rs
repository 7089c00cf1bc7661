//! Fixed constants shared by the protocol codec, connection buffers, and the
//! reactor's timer math. Mirrors the tutorial source's file-scope `const`s
//! so the same numbers stay visible from one place.

/// Maximum encoded size of a single request or response payload, not
/// counting the leading `total_len` field.
pub const MAX_MSG: usize = 4096;

/// Maximum number of argument strings in one request frame.
pub const MAX_ARGS: usize = 1024;

/// Connection buffers are sized a little larger than `MAX_MSG` so a full
/// frame plus its length prefix always fits without extra bookkeeping.
pub const CONN_BUF: usize = 4 + MAX_MSG;

/// A connection idle for this long (no readiness event) is evicted.
pub const IDLE_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on how long the reactor will block in the multiplexer when
/// no connection or TTL deadline is sooner.
pub const POLL_CEILING_MS: u64 = 10_000;

/// Added to the computed next-deadline before converting to a poll
/// timeout, to absorb multiplexer wakeup granularity.
pub const TIMER_FUDGE_MS: u64 = 1;

/// Maximum number of TTL expirations reaped per reactor iteration.
pub const MAX_TTL_REAP_PER_TICK: usize = 2_000;

/// Bounded migration work performed per hash map operation while a rehash
/// is in progress.
pub const HMAP_RESIZE_WORK: usize = 128;

/// Load factor (`size / capacity`) that triggers a hash map rehash.
pub const HMAP_MAX_LOAD_FACTOR: usize = 8;
