//! Incrementally-rehashed open-chaining hash map. Two inner tables, `ht1`
//! (active) and `ht2` (being drained), exactly as in the tutorial source's
//! `HMap`/`HTab` pair — the only difference is that bucket chains link
//! through arena indices (`usize`) instead of raw `HNode*` pointers, so the
//! whole structure is built without `unsafe`.
//!
//! Every stored entry keeps the same arena slot for its entire lifetime,
//! including while it migrates from `ht2` to `ht1` during a rehash —
//! migration only rewrites which bucket chain a slot is linked into, never
//! reallocates the slot itself. Callers that need a stable handle into a
//! specific entry (the TTL heap's back-reference, see `heap.rs`) can hold
//! onto that arena index across inserts, rehashes, and lookups of other
//! keys.

use rkv_common::hash::fnv1;
use rkv_common::limits::{HMAP_MAX_LOAD_FACTOR, HMAP_RESIZE_WORK};

struct HNode<V> {
    hash: u64,
    key: Vec<u8>,
    value: V,
    next: Option<usize>,
}

struct HTab {
    buckets: Vec<Option<usize>>,
    mask: usize,
    size: usize,
}

impl HTab {
    fn empty() -> Self {
        HTab {
            buckets: Vec::new(),
            mask: 0,
            size: 0,
        }
    }

    fn with_capacity(n: usize) -> Self {
        debug_assert!(n > 0 && (n & (n - 1)) == 0, "capacity must be a power of two");
        HTab {
            buckets: vec![None; n],
            mask: n - 1,
            size: 0,
        }
    }

    fn is_empty_table(&self) -> bool {
        self.buckets.is_empty()
    }
}

pub struct HMap<V> {
    nodes: Vec<Option<HNode<V>>>,
    free: Vec<usize>,
    ht1: HTab,
    ht2: HTab,
    resizing_pos: usize,
}

impl<V> Default for HMap<V> {
    fn default() -> Self {
        HMap {
            nodes: Vec::new(),
            free: Vec::new(),
            ht1: HTab::empty(),
            ht2: HTab::empty(),
            resizing_pos: 0,
        }
    }
}

impl<V> HMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ht1.size + self.ht2.size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn alloc_node(&mut self, hash: u64, key: Vec<u8>, value: V) -> usize {
        let node = HNode {
            hash,
            key,
            value,
            next: None,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn dealloc_node(&mut self, idx: usize) -> V {
        let node = self.nodes[idx].take().unwrap();
        self.free.push(idx);
        node.value
    }

    fn node(&self, idx: usize) -> &HNode<V> {
        self.nodes[idx].as_ref().unwrap()
    }

    fn h_insert(&mut self, which: Which, idx: usize) {
        let hash = self.node(idx).hash;
        let tab = self.tab_mut(which);
        let pos = (hash as usize) & tab.mask;
        let head = tab.buckets[pos];
        self.nodes[idx].as_mut().unwrap().next = head;
        let tab = self.tab_mut(which);
        tab.buckets[pos] = Some(idx);
        tab.size += 1;
    }

    fn tab_mut(&mut self, which: Which) -> &mut HTab {
        match which {
            Which::Ht1 => &mut self.ht1,
            Which::Ht2 => &mut self.ht2,
        }
    }

    fn tab(&self, which: Which) -> &HTab {
        match which {
            Which::Ht1 => &self.ht1,
            Which::Ht2 => &self.ht2,
        }
    }

    /// Returns the arena index of `key` in `which`, and the bucket-chain
    /// predecessor slot needed to detach it (`None` predecessor means it
    /// is the bucket head).
    fn h_lookup(&self, which: Which, hash: u64, key: &[u8]) -> Option<usize> {
        let tab = self.tab(which);
        if tab.is_empty_table() {
            return None;
        }
        let pos = (hash as usize) & tab.mask;
        let mut cur = tab.buckets[pos];
        while let Some(idx) = cur {
            let node = self.node(idx);
            if node.hash == hash && node.key == key {
                return Some(idx);
            }
            cur = node.next;
        }
        None
    }

    fn h_detach(&mut self, which: Which, hash: u64, key: &[u8]) -> Option<usize> {
        let tab = self.tab(which);
        if tab.is_empty_table() {
            return None;
        }
        let pos = (hash as usize) & tab.mask;
        let mut cur = self.tab(which).buckets[pos];
        let mut prev: Option<usize> = None;
        while let Some(idx) = cur {
            let (node_hash, node_next, matches) = {
                let node = self.node(idx);
                (node.hash, node.next, node.hash == hash && node.key == key)
            };
            if matches {
                match prev {
                    Some(p) => self.nodes[p].as_mut().unwrap().next = node_next,
                    None => self.tab_mut(which).buckets[pos] = node_next,
                }
                self.tab_mut(which).size -= 1;
                return Some(idx);
            }
            let _ = node_hash;
            prev = Some(idx);
            cur = node_next;
        }
        None
    }

    fn help_resizing(&mut self) {
        let mut nwork = 0;
        while nwork < HMAP_RESIZE_WORK && self.ht2.size > 0 {
            while self.resizing_pos < self.ht2.buckets.len()
                && self.ht2.buckets[self.resizing_pos].is_none()
            {
                self.resizing_pos += 1;
            }
            if self.resizing_pos >= self.ht2.buckets.len() {
                break;
            }
            let idx = self.ht2.buckets[self.resizing_pos].unwrap();
            let hash = self.node(idx).hash;
            let key = self.node(idx).key.clone();
            self.h_detach(Which::Ht2, hash, &key);
            self.h_insert(Which::Ht1, idx);
            nwork += 1;
        }

        if self.ht2.size == 0 && !self.ht2.is_empty_table() {
            self.ht2 = HTab::empty();
        }
    }

    fn start_resizing(&mut self) {
        debug_assert!(self.ht2.is_empty_table());
        let new_cap = if self.ht1.is_empty_table() {
            4
        } else {
            (self.ht1.mask + 1) * 2
        };
        let old_ht1 = std::mem::replace(&mut self.ht1, HTab::with_capacity(new_cap));
        self.ht2 = old_ht1;
        self.resizing_pos = 0;
    }

    pub fn get(&mut self, key: &[u8]) -> Option<&V> {
        self.help_resizing();
        let idx = self.find_node_id(key)?;
        Some(&self.node(idx).value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        self.help_resizing();
        let idx = self.find_node_id(key)?;
        Some(&mut self.nodes[idx].as_mut().unwrap().value)
    }

    /// Resolves `key` to a stable arena index, performing the same
    /// amortized rehash work a normal lookup would. Useful for callers
    /// that want to stash a handle to this entry (see `heap.rs`).
    pub fn find_node_id(&mut self, key: &[u8]) -> Option<usize> {
        self.help_resizing();
        let hash = fnv1(key);
        self.h_lookup(Which::Ht1, hash, key)
            .or_else(|| self.h_lookup(Which::Ht2, hash, key))
    }

    pub fn value_by_node(&self, node: usize) -> &V {
        &self.node(node).value
    }

    pub fn value_by_node_mut(&mut self, node: usize) -> &mut V {
        &mut self.nodes[node].as_mut().unwrap().value
    }

    pub fn key_by_node(&self, node: usize) -> &[u8] {
        &self.node(node).key
    }

    /// Inserts a new key. Caller is responsible for having already checked
    /// the key is absent (mirrors `hm_insert`, which never deduplicates);
    /// `keyspace.rs` looks up first and mutates in place on a hit.
    pub fn insert(&mut self, key: Vec<u8>, value: V) -> usize {
        let hash = fnv1(&key);
        let idx = self.alloc_node(hash, key, value);

        if self.ht1.is_empty_table() {
            self.ht1 = HTab::with_capacity(4);
        }
        self.h_insert(Which::Ht1, idx);

        if self.ht2.is_empty_table() {
            let load_factor = self.ht1.size / (self.ht1.mask + 1);
            if load_factor >= HMAP_MAX_LOAD_FACTOR {
                self.start_resizing();
            }
        }
        self.help_resizing();
        idx
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        self.help_resizing();
        let hash = fnv1(key);
        let idx = self
            .h_detach(Which::Ht1, hash, key)
            .or_else(|| self.h_detach(Which::Ht2, hash, key))?;
        Some(self.dealloc_node(idx))
    }

    /// Visits every live `(key, value)` pair. Order is unspecified, as in
    /// the tutorial's `h_scan`.
    pub fn scan(&self, mut f: impl FnMut(&[u8], &V)) {
        for tab in [&self.ht1, &self.ht2] {
            for head in &tab.buckets {
                let mut cur = *head;
                while let Some(idx) = cur {
                    let node = self.node(idx);
                    f(&node.key, &node.value);
                    cur = node.next;
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Which {
    Ht1,
    Ht2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lookup_remove_roundtrip() {
        let mut map = HMap::new();
        map.insert(b"foo".to_vec(), 1);
        map.insert(b"bar".to_vec(), 2);
        assert_eq!(map.get(b"foo"), Some(&1));
        assert_eq!(map.get(b"bar"), Some(&2));
        assert_eq!(map.get(b"baz"), None);
        assert_eq!(map.remove(b"foo"), Some(1));
        assert_eq!(map.get(b"foo"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn triggers_incremental_rehash_under_load() {
        let mut map = HMap::new();
        for i in 0..5000u32 {
            map.insert(i.to_le_bytes().to_vec(), i);
        }
        assert_eq!(map.len(), 5000);
        for i in 0..5000u32 {
            assert_eq!(map.get(&i.to_le_bytes()), Some(&i));
        }
    }

    #[test]
    fn node_id_stable_across_rehash() {
        let mut map = HMap::new();
        let id = map.insert(b"stable".to_vec(), 42);
        for i in 0..5000u32 {
            map.insert(format!("k{i}").into_bytes(), i);
        }
        assert_eq!(*map.value_by_node(id), 42);
        assert_eq!(map.key_by_node(id), b"stable");
    }

    #[test]
    fn scan_visits_every_live_entry_exactly_once() {
        let mut map = HMap::new();
        for i in 0..50u32 {
            map.insert(i.to_le_bytes().to_vec(), i);
        }
        map.remove(&7u32.to_le_bytes());
        let mut seen = Vec::new();
        map.scan(|_, v| seen.push(*v));
        seen.sort_unstable();
        let mut expected: Vec<u32> = (0..50).filter(|&i| i != 7).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }
}
