//! Binary min-heap keyed by a `u64` deadline, used by the keyspace to drive
//! TTL expiry. Mirrors the tutorial source's `HeapItem` array (`heap.h`):
//! every entry carries a "back-reference" so its owner always knows where in
//! the array it currently lives, even after a sift moves it.
//!
//! The tutorial expresses the back-reference as `size_t *ref` pointing
//! directly into the owning `Entry`. This module can't borrow into a
//! caller-owned structure like that, so the back-reference becomes a
//! callback: every swap invokes `on_move(payload, new_pos)` so the caller
//! can write the new position wherever it keeps it (see
//! `rkv-server`'s keyspace, which stores it as `Entry::ttl_pos`).

pub struct Heap<T> {
    items: Vec<(u64, T)>,
}

impl<T> Default for Heap<T> {
    fn default() -> Self {
        Heap { items: Vec::new() }
    }
}

impl<T: Copy> Heap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The deadline of the item currently sitting at `pos`.
    pub fn deadline(&self, pos: usize) -> u64 {
        self.items[pos].0
    }

    /// The (deadline, payload) pair with the smallest deadline, if any.
    pub fn peek_min(&self) -> Option<(u64, T)> {
        self.items.first().copied()
    }

    /// Inserts a new item and returns its resting position after sift-up.
    pub fn push(&mut self, deadline: u64, payload: T, mut on_move: impl FnMut(T, usize)) -> usize {
        let pos = self.items.len();
        self.items.push((deadline, payload));
        on_move(payload, pos);
        self.sift_up(pos, &mut on_move)
    }

    /// Changes the deadline of the item at `pos` and re-heapifies around it.
    pub fn set_deadline(&mut self, pos: usize, deadline: u64, on_move: impl FnMut(T, usize)) {
        self.items[pos].0 = deadline;
        self.update(pos, on_move);
    }

    /// Re-heapifies around `pos` after its ordering key may have changed.
    /// Tries sift-up first; if the item doesn't move up, it sifts down —
    /// exactly one of the two can ever be needed after a single key change.
    pub fn update(&mut self, pos: usize, mut on_move: impl FnMut(T, usize)) {
        let moved_to = self.sift_up(pos, &mut on_move);
        if moved_to == pos {
            self.sift_down(pos, &mut on_move);
        }
    }

    /// Removes the item at `pos` by swapping in the tail and re-heapifying,
    /// returning the removed `(deadline, payload)`.
    pub fn remove(&mut self, pos: usize, mut on_move: impl FnMut(T, usize)) -> (u64, T) {
        let last = self.items.len() - 1;
        self.items.swap(pos, last);
        let removed = self.items.pop().expect("remove called on empty heap");
        if pos < self.items.len() {
            on_move(self.items[pos].1, pos);
            self.update(pos, on_move);
        }
        removed
    }

    pub fn pop_min(&mut self, on_move: impl FnMut(T, usize)) -> Option<(u64, T)> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.remove(0, on_move))
    }

    fn sift_up(&mut self, mut pos: usize, on_move: &mut impl FnMut(T, usize)) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.items[parent].0 <= self.items[pos].0 {
                break;
            }
            self.items.swap(parent, pos);
            on_move(self.items[pos].1, pos);
            on_move(self.items[parent].1, parent);
            pos = parent;
        }
        pos
    }

    fn sift_down(&mut self, mut pos: usize, on_move: &mut impl FnMut(T, usize)) {
        let len = self.items.len();
        loop {
            let l = 2 * pos + 1;
            let r = 2 * pos + 2;
            let mut smallest = pos;
            if l < len && self.items[l].0 < self.items[smallest].0 {
                smallest = l;
            }
            if r < len && self.items[r].0 < self.items[smallest].0 {
                smallest = r;
            }
            if smallest == pos {
                break;
            }
            self.items.swap(pos, smallest);
            on_move(self.items[pos].1, pos);
            on_move(self.items[smallest].1, smallest);
            pos = smallest;
        }
    }
}
