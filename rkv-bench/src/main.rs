//! Dependency-free benchmark driver for `rkv-core`'s data structures,
//! following the same design principles as the teacher's engine benchmark:
//! a fixed-seed PRNG for reproducibility, pre-built keys to keep setup off
//! the hot path, and direct calls to the concrete types (no dynamic
//! dispatch).

use std::env;
use std::hint::black_box;
use std::time::Instant;

use rkv_core::{HMap, ZSet};

const DEFAULT_KEY_COUNT: usize = 1 << 16;
const DEFAULT_OP_COUNT: usize = 1_000_000;

struct BenchConfig {
    requested_keys: usize,
    key_count: usize,
    key_mask: usize,
    op_count: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let requested_keys = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);

        let key_count = normalize_power_of_two(requested_keys);
        let key_mask = key_count - 1;

        BenchConfig { requested_keys, key_count, key_mask, op_count }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

fn normalize_power_of_two(value: usize) -> usize {
    let value = value.max(1);
    if value.is_power_of_two() {
        value
    } else {
        value.next_power_of_two()
    }
}

/// Tiny deterministic PRNG used to avoid external dependencies.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn build_keys(count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut keys = Vec::with_capacity(count);
    for i in 0..count {
        keys.push((seed ^ (i as u64)).to_le_bytes().to_vec());
    }
    keys
}

fn report(label: &str, ops: usize, elapsed: std::time::Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

fn bench_hmap(config: &BenchConfig) {
    let keys = build_keys(config.key_count, 0xA5A5_A5A5_A5A5_A5A5);
    let mut map: HMap<u64> = HMap::new();
    for (i, k) in keys.iter().enumerate() {
        map.insert(k.clone(), i as u64);
    }

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        black_box(map.get(&keys[idx]));
    }
    report("HMap::get", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for i in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        map.insert(keys[idx].clone(), i as u64);
    }
    report("HMap::insert (overwrite)", config.op_count, start.elapsed());
}

fn bench_zset(config: &BenchConfig) {
    let names = build_keys(config.key_count, 0x1111_2222_3333_4444);
    let mut zset = ZSet::new();
    let mut rng = XorShift64::new(0xC0FF_EEC0_FFEE_C0FF);
    for name in &names {
        let score = (rng.next_u64() % 1_000_000) as f64;
        zset.add(name.clone(), score);
    }

    let mut rng = XorShift64::new(0x5555_6666_7777_8888);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        black_box(zset.lookup(&names[idx]));
    }
    report("ZSet::lookup", config.op_count, start.elapsed());
}

fn main() {
    let config = BenchConfig::from_args();
    println!(
        "keys: requested={}, actual={}, ops={}",
        config.requested_keys, config.key_count, config.op_count
    );
    bench_hmap(&config);
    bench_zset(&config);
}
