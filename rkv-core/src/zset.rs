//! Sorted set: members ordered by `(score, name)`, backed by the AVL tree in
//! [`crate::avl`] plus a name -> tree-node index for O(1) membership lookup.
//! Grounded on the tutorial's `zset.cpp`/`zset.h` (`ZSet`, `ZNode`, `zless`,
//! `tree_add`, `zset_add`, `zset_lookup`, `zset_pop`, `zset_query`,
//! `znode_offset`).

use crate::avl::{AvlId, AvlTree};
use crate::hashmap::HMap;

pub struct ZNode {
    pub name: Vec<u8>,
    pub score: f64,
}

/// `(score, name)` ordering used throughout: a score difference decides
/// first, a name comparison breaks ties. `Vec<u8>`/`&[u8]`'s `Ord` already
/// does the tutorial's "compare bytes, shorter wins on a common prefix"
/// tie-break, so no custom wrapper type is needed here.
fn less(a: &ZNode, b: &ZNode) -> bool {
    if a.score != b.score {
        a.score < b.score
    } else {
        a.name.as_slice() < b.name.as_slice()
    }
}

fn less_than_query(node: &ZNode, score: f64, name: &[u8]) -> bool {
    if node.score != score {
        node.score < score
    } else {
        node.name.as_slice() < name
    }
}

#[derive(Default)]
pub struct ZSet {
    tree: AvlTree<ZNode>,
    index: HMap<AvlId>,
}

impl ZSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Inserts `name` with `score`, or updates its score if already present.
    /// Returns `true` if this created a brand new member.
    pub fn add(&mut self, name: Vec<u8>, score: f64) -> bool {
        if let Some(&id) = self.index.get(&name) {
            if self.tree.payload(id).score == score {
                return false;
            }
            let (mut payload, _) = self.tree.del(id);
            payload.score = score;
            let new_id = self.tree.alloc(payload);
            self.tree_add(new_id);
            *self.index.get_mut(&name).expect("index entry vanished") = new_id;
            return false;
        }
        let id = self.tree.alloc(ZNode { name: name.clone(), score });
        self.index.insert(name, id);
        self.tree_add(id);
        true
    }

    /// Removes `name`, returning its `(name, score)` if it was present.
    pub fn pop(&mut self, name: &[u8]) -> Option<(Vec<u8>, f64)> {
        let id = self.index.remove(name)?;
        let (payload, _) = self.tree.del(id);
        Some((payload.name, payload.score))
    }

    pub fn lookup(&mut self, name: &[u8]) -> Option<f64> {
        let id = *self.index.get(name)?;
        Some(self.tree.payload(id).score)
    }

    /// Finds the lowest-ranked node with `(score, name)` not less than the
    /// query pair — the tree-search entry point for range scans.
    pub fn query(&self, score: f64, name: &[u8]) -> Option<AvlId> {
        let mut found = None;
        let mut cur = self.tree.root();
        while let Some(node) = cur {
            let payload = self.tree.payload(node);
            if less_than_query(payload, score, name) {
                cur = self.tree.right(node);
            } else {
                found = Some(node);
                cur = self.tree.left(node);
            }
        }
        found
    }

    /// Walks `k` ranks forward (or backward, if negative) from `node`.
    pub fn offset(&self, node: AvlId, k: i64) -> Option<AvlId> {
        self.tree.offset(node, k)
    }

    pub fn payload(&self, id: AvlId) -> &ZNode {
        self.tree.payload(id)
    }

    pub fn dispose(&mut self) {
        self.tree = AvlTree::new();
        self.index = HMap::new();
    }

    fn tree_add(&mut self, id: AvlId) {
        match self.tree.root() {
            None => self.tree.set_root(id),
            Some(root) => {
                let mut cur = root;
                loop {
                    let go_left = less(self.tree.payload(id), self.tree.payload(cur));
                    let next = if go_left { self.tree.left(cur) } else { self.tree.right(cur) };
                    match next {
                        Some(n) => cur = n,
                        None => {
                            self.tree.attach_as_child(cur, id, go_left);
                            let new_root = self.tree.fix(id);
                            self.tree.set_root(new_root);
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn add_then_lookup_roundtrips() {
        let mut z = ZSet::new();
        assert!(z.add(name("alice"), 1.0));
        assert!(z.add(name("bob"), 2.0));
        assert!(!z.add(name("alice"), 5.0)); // update, not insert
        assert_eq!(z.lookup(&name("alice")), Some(5.0));
        assert_eq!(z.lookup(&name("bob")), Some(2.0));
        assert_eq!(z.lookup(&name("carol")), None);
        assert_eq!(z.len(), 2);
    }

    #[test]
    fn pop_removes_member_and_orphans_score() {
        let mut z = ZSet::new();
        z.add(name("a"), 1.0);
        z.add(name("b"), 2.0);
        let (removed_name, removed_score) = z.pop(&name("a")).unwrap();
        assert_eq!(removed_name, name("a"));
        assert_eq!(removed_score, 1.0);
        assert_eq!(z.lookup(&name("a")), None);
        assert!(z.pop(&name("a")).is_none());
        assert_eq!(z.len(), 1);
    }

    #[test]
    fn query_and_offset_walk_in_rank_order() {
        let mut z = ZSet::new();
        let members = [("a", 1.0), ("b", 2.0), ("c", 2.0), ("d", 3.0)];
        for (n, s) in members {
            z.add(name(n), s);
        }
        // (score=2.0, name="a") sorts just before "b" since "a" < "b".
        let start = z.query(2.0, &name("a")).expect("expected a node");
        assert_eq!(z.payload(start).name, name("b"));

        let next = z.offset(start, 1).expect("next rank");
        assert_eq!(z.payload(next).name, name("c"));

        let back = z.offset(next, -1).expect("back to start");
        assert_eq!(z.payload(back).name, name("b"));

        assert!(z.offset(next, 2).is_none());
    }

    #[test]
    fn many_inserts_preserve_rank_order() {
        let mut z = ZSet::new();
        let mut expected: Vec<(String, f64)> = Vec::new();
        let mut seed = 0x1234_5678u64;
        for i in 0..300 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let score = (seed >> 33) as f64 % 50.0;
            let name_s = format!("m{i}");
            z.add(name_s.as_bytes().to_vec(), score);
            expected.push((name_s, score));
        }
        expected.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));

        let first = z.query(f64::MIN, &[]).expect("tree non-empty");
        let mut cur = Some(first);
        for (exp_name, exp_score) in &expected {
            let id = cur.expect("ran out of nodes early");
            let node = z.payload(id);
            assert_eq!(&node.name, exp_name.as_bytes());
            assert_eq!(node.score, *exp_score);
            cur = z.offset(id, 1);
        }
        assert!(cur.is_none());
    }
}
