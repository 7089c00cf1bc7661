//! The process-wide keyspace: a hash map from key bytes to [`Entry`], plus
//! the TTL min-heap that drives expiry. Command-level operations here
//! mirror `do_get`/`do_set`/`do_del`/`do_expire`/`do_ttl`/`do_zadd`/
//! `do_zrem`/`do_zscore`/`do_zquery` in the tutorial's `section13/server.cpp`,
//! translated onto `rkv-core`'s `HMap`/`ZSet`/`Heap`.

use rkv_common::ErrCode;
use rkv_core::{HMap, Heap, ZSet};

use crate::clock::now_us;

pub enum Value {
    Str(Vec<u8>),
    Zset(ZSet),
}

pub struct Entry {
    pub value: Value,
    /// Position of this entry's TTL item in `Keyspace::ttl_heap`, if any.
    ttl_pos: Option<usize>,
}

#[derive(Default)]
pub struct Keyspace {
    map: HMap<Entry>,
    ttl_heap: Heap<usize>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The deadline of the earliest pending TTL, if any — consulted by the
    /// reactor when computing its next poll timeout.
    pub fn next_ttl_deadline_us(&self) -> Option<u64> {
        self.ttl_heap.peek_min().map(|(deadline, _)| deadline)
    }

    pub fn get_str(&mut self, key: &[u8]) -> Result<Option<&[u8]>, ErrCode> {
        let Some(idx) = self.map.find_node_id(key) else { return Ok(None) };
        match &self.map.value_by_node(idx).value {
            Value::Str(s) => Ok(Some(s.as_slice())),
            Value::Zset(_) => Err(ErrCode::Type),
        }
    }

    /// Sets a string value, leaving any existing TTL untouched — mirrors
    /// `do_set`, which never calls `entry_set_ttl`.
    pub fn set_str(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), ErrCode> {
        if let Some(idx) = self.map.find_node_id(key) {
            return match &mut self.map.value_by_node_mut(idx).value {
                Value::Str(s) => {
                    *s = value;
                    Ok(())
                }
                Value::Zset(_) => Err(ErrCode::Type),
            };
        }
        self.map.insert(
            key.to_vec(),
            Entry {
                value: Value::Str(value),
                ttl_pos: None,
            },
        );
        Ok(())
    }

    pub fn del(&mut self, key: &[u8]) -> bool {
        let Some(mut entry) = self.map.remove(key) else { return false };
        if let Some(pos) = entry.ttl_pos {
            let map = &mut self.map;
            self.ttl_heap.remove(pos, |payload, new_pos| {
                map.value_by_node_mut(payload).ttl_pos = Some(new_pos);
            });
        }
        if let Value::Zset(z) = &mut entry.value {
            z.dispose();
        }
        true
    }

    /// Sets (or clears, if `ms < 0`) a key's TTL. Returns `false` if the key
    /// doesn't exist.
    pub fn pexpire(&mut self, key: &[u8], ms: i64) -> bool {
        let Some(idx) = self.map.find_node_id(key) else { return false };
        let cur_ttl_pos = self.map.value_by_node(idx).ttl_pos;

        if ms < 0 {
            if let Some(pos) = cur_ttl_pos {
                let map = &mut self.map;
                self.ttl_heap.remove(pos, |payload, new_pos| {
                    map.value_by_node_mut(payload).ttl_pos = Some(new_pos);
                });
                self.map.value_by_node_mut(idx).ttl_pos = None;
            }
            return true;
        }

        let deadline = now_us() + (ms as u64) * 1000;
        match cur_ttl_pos {
            Some(pos) => {
                let map = &mut self.map;
                self.ttl_heap.set_deadline(pos, deadline, |payload, new_pos| {
                    map.value_by_node_mut(payload).ttl_pos = Some(new_pos);
                });
            }
            None => {
                let map = &mut self.map;
                self.ttl_heap.push(deadline, idx, |payload, new_pos| {
                    map.value_by_node_mut(payload).ttl_pos = Some(new_pos);
                });
            }
        }
        true
    }

    /// `-2` if the key is missing, `-1` if it has no TTL, else ms remaining.
    pub fn pttl(&mut self, key: &[u8]) -> i64 {
        let Some(idx) = self.map.find_node_id(key) else { return -2 };
        let Some(pos) = self.map.value_by_node(idx).ttl_pos else { return -1 };
        let deadline = self.ttl_heap.deadline(pos);
        let now = now_us();
        if deadline > now {
            ((deadline - now) / 1000) as i64
        } else {
            0
        }
    }

    pub fn zadd(&mut self, key: &[u8], score: f64, name: &[u8]) -> Result<bool, ErrCode> {
        if let Some(idx) = self.map.find_node_id(key) {
            return match &mut self.map.value_by_node_mut(idx).value {
                Value::Zset(z) => Ok(z.add(name.to_vec(), score)),
                Value::Str(_) => Err(ErrCode::Type),
            };
        }
        let mut z = ZSet::new();
        let added = z.add(name.to_vec(), score);
        self.map.insert(
            key.to_vec(),
            Entry {
                value: Value::Zset(z),
                ttl_pos: None,
            },
        );
        Ok(added)
    }

    /// `Ok(None)` means the key is missing (caller emits NIL, as
    /// `expect_zset` does in the tutorial); `Ok(Some(removed))` is the
    /// normal removal result for an existing zset.
    pub fn zrem(&mut self, key: &[u8], name: &[u8]) -> Result<Option<bool>, ErrCode> {
        let Some(idx) = self.map.find_node_id(key) else { return Ok(None) };
        match &mut self.map.value_by_node_mut(idx).value {
            Value::Zset(z) => Ok(Some(z.pop(name).is_some())),
            Value::Str(_) => Err(ErrCode::Type),
        }
    }

    /// `None` covers both "key missing" and "member not in the zset" —
    /// both render as NIL, so the dispatcher doesn't need to distinguish.
    pub fn zscore(&mut self, key: &[u8], name: &[u8]) -> Result<Option<f64>, ErrCode> {
        let Some(idx) = self.map.find_node_id(key) else { return Ok(None) };
        match &mut self.map.value_by_node_mut(idx).value {
            Value::Zset(z) => Ok(z.lookup(name)),
            Value::Str(_) => Err(ErrCode::Type),
        }
    }

    /// Missing key yields an empty result (not an error) per the tutorial's
    /// `do_zquery` override of `expect_zset`'s NIL into an empty array;
    /// wrong type is still a `Type` error.
    ///
    /// `limit` bounds the number of *elements* emitted (name + score count
    /// as two each), not the number of pairs — replicated from
    /// `do_zquery`'s `n += 2` loop counter, which is compared directly
    /// against `limit`.
    pub fn zquery(
        &mut self,
        key: &[u8],
        score: f64,
        name: &[u8],
        offset: i64,
        limit: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>, ErrCode> {
        let Some(idx) = self.map.find_node_id(key) else { return Ok(Vec::new()) };
        let zset = match &self.map.value_by_node(idx).value {
            Value::Zset(z) => z,
            Value::Str(_) => return Err(ErrCode::Type),
        };
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let Some(start) = zset.query(score, name) else { return Ok(Vec::new()) };
        let Some(mut cur) = zset.offset(start, offset) else { return Ok(Vec::new()) };

        let mut out = Vec::new();
        let mut n: i64 = 0;
        loop {
            if n >= limit {
                break;
            }
            let node = zset.payload(cur);
            out.push((node.name.clone(), node.score));
            n += 2;
            match zset.offset(cur, 1) {
                Some(next) => cur = next,
                None => break,
            }
        }
        Ok(out)
    }

    /// Invokes `f` once per live key, mirroring `h_scan`/`cb_scan` — the
    /// `keys` handler supplies the closure that appends to the response.
    pub fn scan_keys(&self, f: impl FnMut(&[u8])) {
        let mut f = f;
        self.map.scan(|k, _| f(k));
    }

    /// Reaps up to `cap` TTL-expired entries, returning how many were
    /// removed. Called once per reactor iteration from `process_timers`.
    pub fn reap_expired(&mut self, now_us: u64, cap: usize) -> usize {
        let mut n = 0;
        while n < cap {
            let Some((deadline, _)) = self.ttl_heap.peek_min() else { break };
            if deadline >= now_us {
                break;
            }
            let map = &mut self.map;
            let (_, idx) = self
                .ttl_heap
                .pop_min(|payload, new_pos| {
                    map.value_by_node_mut(payload).ttl_pos = Some(new_pos);
                })
                .expect("peek_min just confirmed a root exists");
            let key = self.map.key_by_node(idx).to_vec();
            if let Some(mut entry) = self.map.remove(&key) {
                if let Value::Zset(z) = &mut entry.value {
                    z.dispose();
                }
            }
            n += 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_del_roundtrip() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.get_str(b"foo"), Ok(None));
        assert_eq!(ks.set_str(b"foo", b"bar".to_vec()), Ok(()));
        assert_eq!(ks.get_str(b"foo"), Ok(Some(&b"bar"[..])));
        assert!(ks.del(b"foo"));
        assert_eq!(ks.get_str(b"foo"), Ok(None));
        assert!(!ks.del(b"foo"));
    }

    #[test]
    fn set_on_zset_key_is_a_type_error() {
        let mut ks = Keyspace::new();
        ks.zadd(b"z", 1.0, b"a").unwrap();
        assert_eq!(ks.set_str(b"z", b"v".to_vec()), Err(ErrCode::Type));
        assert_eq!(ks.get_str(b"z"), Err(ErrCode::Type));
    }

    #[test]
    fn pexpire_and_pttl_track_a_deadline() {
        let mut ks = Keyspace::new();
        ks.set_str(b"k", b"v".to_vec()).unwrap();
        assert_eq!(ks.pttl(b"k"), -1);
        assert!(ks.pexpire(b"k", 60_000));
        let ttl = ks.pttl(b"k");
        assert!((0..=60_000).contains(&ttl), "ttl={ttl}");
        assert!(ks.pexpire(b"k", -1));
        assert_eq!(ks.pttl(b"k"), -1);
        assert_eq!(ks.pttl(b"missing"), -2);
    }

    #[test]
    fn reap_expired_removes_past_deadlines_only() {
        let mut ks = Keyspace::new();
        ks.set_str(b"a", b"1".to_vec()).unwrap();
        ks.set_str(b"b", b"2".to_vec()).unwrap();
        ks.pexpire(b"a", 10);
        ks.pexpire(b"b", 100_000);
        let reaped = ks.reap_expired(now_us() + 20_000, 100);
        assert_eq!(reaped, 1);
        assert_eq!(ks.get_str(b"a"), Ok(None));
        assert_eq!(ks.get_str(b"b"), Ok(Some(&b"2"[..])));
    }

    #[test]
    fn zadd_zrem_zscore_zquery() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.zadd(b"z", 1.5, b"alice"), Ok(true));
        assert_eq!(ks.zadd(b"z", 2.0, b"bob"), Ok(true));
        assert_eq!(ks.zadd(b"z", 1.5, b"alice"), Ok(false));
        assert_eq!(ks.zscore(b"z", b"alice"), Ok(Some(1.5)));
        assert_eq!(ks.zscore(b"z", b"nope"), Ok(None));
        assert_eq!(ks.zscore(b"nope", b"x"), Ok(None));

        let results = ks.zquery(b"z", 0.0, b"", 0, 10).unwrap();
        assert_eq!(results, vec![(b"alice".to_vec(), 1.5), (b"bob".to_vec(), 2.0)]);

        assert_eq!(ks.zrem(b"z", b"alice"), Ok(Some(true)));
        assert_eq!(ks.zrem(b"z", b"alice"), Ok(Some(false)));
        assert_eq!(ks.zrem(b"missing", b"x"), Ok(None));
    }

    #[test]
    fn zquery_missing_key_is_empty_not_error() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.zquery(b"nope", 0.0, b"", 0, 10), Ok(Vec::new()));
    }

    #[test]
    fn zquery_wrong_type_is_a_type_error() {
        let mut ks = Keyspace::new();
        ks.set_str(b"k", b"v".to_vec()).unwrap();
        assert_eq!(ks.zquery(b"k", 0.0, b"", 0, 10), Err(ErrCode::Type));
    }

    #[test]
    fn scan_keys_visits_every_live_key() {
        let mut ks = Keyspace::new();
        ks.set_str(b"a", b"1".to_vec()).unwrap();
        ks.set_str(b"b", b"2".to_vec()).unwrap();
        ks.del(b"a");
        let mut seen = Vec::new();
        ks.scan_keys(|k| seen.push(k.to_vec()));
        assert_eq!(seen, vec![b"b".to_vec()]);
    }
}
