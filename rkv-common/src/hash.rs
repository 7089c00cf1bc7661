//! FNV-1-variant byte hash shared by the keyspace hash map and the sorted
//! set's member-name hash map, so both containers behave identically.

const FNV_SEED: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

pub fn fnv1(bytes: &[u8]) -> u64 {
    let mut h: u32 = FNV_SEED;
    for &b in bytes {
        h = h.wrapping_add(b as u32).wrapping_mul(FNV_PRIME);
    }
    h as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_seed() {
        assert_eq!(fnv1(b""), FNV_SEED as u64);
    }

    #[test]
    fn known_pairs_are_stable() {
        // Pinned so the seed/prime constants never silently drift.
        assert_eq!(fnv1(b"k"), 0x700d_0590);
        assert_eq!(fnv1(b"foo"), 0x44b0_29dd);
        assert_ne!(fnv1(b"foo"), fnv1(b"bar"));
    }
}
