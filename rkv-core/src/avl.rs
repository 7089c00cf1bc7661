//! Arena-backed AVL tree with subtree-size bookkeeping for O(log n) rank
//! queries. Generic over a payload `T` the caller controls; this module
//! only implements balance, linkage, and positional offset. Ordering is the
//! caller's responsibility (see `zset.rs`), matching the tutorial source
//! where the AVL module never compares keys itself.
//!
//! Every pointer in the tutorial's `AVLNode` (`left`, `right`, `parent`)
//! becomes an `Option<AvlId>` index into a `Vec`-backed arena here, with a
//! free list recycling vacated slots — no `unsafe`, no `container_of`.

/// Index into the tree's node arena. Stable for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvlId(usize);

struct Node<T> {
    depth: u32,
    cnt: u32,
    left: Option<AvlId>,
    right: Option<AvlId>,
    parent: Option<AvlId>,
    payload: T,
}

pub struct AvlTree<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    root: Option<AvlId>,
}

impl<T> Default for AvlTree<T> {
    fn default() -> Self {
        AvlTree {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
        }
    }
}

impl<T> AvlTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<AvlId> {
        self.root
    }

    pub fn payload(&self, id: AvlId) -> &T {
        &self.nodes[id.0].as_ref().unwrap().payload
    }

    pub fn payload_mut(&mut self, id: AvlId) -> &mut T {
        &mut self.nodes[id.0].as_mut().unwrap().payload
    }

    pub fn left(&self, id: AvlId) -> Option<AvlId> {
        self.nodes[id.0].as_ref().unwrap().left
    }

    pub fn right(&self, id: AvlId) -> Option<AvlId> {
        self.nodes[id.0].as_ref().unwrap().right
    }

    pub fn parent(&self, id: AvlId) -> Option<AvlId> {
        self.nodes[id.0].as_ref().unwrap().parent
    }

    pub fn cnt(&self, id: Option<AvlId>) -> u32 {
        id.map_or(0, |id| self.nodes[id.0].as_ref().unwrap().cnt)
    }

    fn depth(&self, id: Option<AvlId>) -> u32 {
        id.map_or(0, |id| self.nodes[id.0].as_ref().unwrap().depth)
    }

    fn set_left(&mut self, id: AvlId, child: Option<AvlId>) {
        self.nodes[id.0].as_mut().unwrap().left = child;
    }

    fn set_right(&mut self, id: AvlId, child: Option<AvlId>) {
        self.nodes[id.0].as_mut().unwrap().right = child;
    }

    fn set_parent(&mut self, id: AvlId, parent: Option<AvlId>) {
        self.nodes[id.0].as_mut().unwrap().parent = parent;
    }

    /// Replaces whichever of `parent`'s children is `old` with `new`.
    fn replace_child(&mut self, parent: AvlId, old: AvlId, new: Option<AvlId>) {
        if self.left(parent) == Some(old) {
            self.set_left(parent, new);
        } else {
            self.set_right(parent, new);
        }
    }

    /// Allocates a new, unlinked, depth-1/cnt-1 node holding `payload`.
    /// The caller positions it with a tree search and attaches it (setting
    /// `left`/`right`/`parent` directly) before calling [`fix`].
    pub fn alloc(&mut self, payload: T) -> AvlId {
        let node = Node {
            depth: 1,
            cnt: 1,
            left: None,
            right: None,
            parent: None,
            payload,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            AvlId(idx)
        } else {
            self.nodes.push(Some(node));
            AvlId(self.nodes.len() - 1)
        }
    }

    fn dealloc(&mut self, id: AvlId) -> T {
        let node = self.nodes[id.0].take().unwrap();
        self.free.push(id.0);
        node.payload
    }

    fn update(&mut self, id: AvlId) {
        let l = self.depth(self.left(id));
        let r = self.depth(self.right(id));
        let cl = self.cnt(self.left(id));
        let cr = self.cnt(self.right(id));
        let n = self.nodes[id.0].as_mut().unwrap();
        n.depth = 1 + l.max(r);
        n.cnt = 1 + cl + cr;
    }

    fn rot_left(&mut self, node: AvlId) -> AvlId {
        let new_node = self.right(node).expect("rot_left requires a right child");
        let new_left = self.left(new_node);
        if let Some(nl) = new_left {
            self.set_parent(nl, Some(node));
        }
        self.set_right(node, new_left);
        self.set_left(new_node, Some(node));
        let parent = self.parent(node);
        self.set_parent(new_node, parent);
        self.set_parent(node, Some(new_node));
        self.update(node);
        self.update(new_node);
        new_node
    }

    fn rot_right(&mut self, node: AvlId) -> AvlId {
        let new_node = self.left(node).expect("rot_right requires a left child");
        let new_right = self.right(new_node);
        if let Some(nr) = new_right {
            self.set_parent(nr, Some(node));
        }
        self.set_left(node, new_right);
        self.set_right(new_node, Some(node));
        let parent = self.parent(node);
        self.set_parent(new_node, parent);
        self.set_parent(node, Some(new_node));
        self.update(node);
        self.update(new_node);
        new_node
    }

    /// The left subtree is too deep.
    fn fix_left(&mut self, root: AvlId) -> AvlId {
        let left = self.left(root).unwrap();
        if self.depth(self.left(left)) < self.depth(self.right(left)) {
            let new_left = self.rot_left(left);
            self.set_left(root, Some(new_left));
        }
        self.rot_right(root)
    }

    /// The right subtree is too deep.
    fn fix_right(&mut self, root: AvlId) -> AvlId {
        let right = self.right(root).unwrap();
        if self.depth(self.right(right)) < self.depth(self.left(right)) {
            let new_right = self.rot_right(right);
            self.set_right(root, Some(new_right));
        }
        self.rot_left(root)
    }

    /// Rebalances every ancestor of `node` up to the root, updating
    /// `root` as rotations change it, and returns the tree's new root.
    ///
    /// Mirrors `avl_fix`: the child slot on `node`'s parent that needs to
    /// be repointed (`from`) is determined before any rotation runs, since
    /// a rotation changes which id occupies `node`'s old position.
    pub fn fix(&mut self, node: AvlId) -> AvlId {
        let mut node = node;
        loop {
            self.update(node);
            let l = self.depth(self.left(node));
            let r = self.depth(self.right(node));
            let parent = self.parent(node);
            let from_is_left = parent.map(|p| self.left(p) == Some(node));

            let new_node = if l == r + 2 {
                self.fix_left(node)
            } else if l + 2 == r {
                self.fix_right(node)
            } else {
                node
            };

            match parent {
                None => {
                    self.root = Some(new_node);
                    return new_node;
                }
                Some(p) => {
                    if from_is_left.unwrap() {
                        self.set_left(p, Some(new_node));
                    } else {
                        self.set_right(p, Some(new_node));
                    }
                    node = p;
                }
            }
        }
    }

    /// Detaches `node` from the tree and frees its arena slot, returning
    /// its payload and the tree's new root (`None` if now empty).
    pub fn del(&mut self, node: AvlId) -> (T, Option<AvlId>) {
        let new_root = self.unlink(node);
        self.root = new_root;
        (self.dealloc(node), new_root)
    }

    fn unlink(&mut self, node: AvlId) -> Option<AvlId> {
        if self.right(node).is_none() {
            let parent = self.parent(node);
            let left = self.left(node);
            if let Some(l) = left {
                self.set_parent(l, parent);
            }
            match parent {
                Some(p) => {
                    self.replace_child(p, node, left);
                    Some(self.fix(p))
                }
                None => left,
            }
        } else {
            let mut victim = self.right(node).unwrap();
            while let Some(l) = self.left(victim) {
                victim = l;
            }
            let root = self.unlink(victim);

            // Relabel: victim inherits node's current linkage (already
            // rebalanced by the recursive unlink above); node's identity
            // is discarded by the caller.
            let left = self.left(node);
            let right = self.right(node);
            let parent = self.parent(node);
            let depth = self.depth(Some(node));
            let cnt = self.cnt(Some(node));

            self.set_left(victim, left);
            self.set_right(victim, right);
            self.set_parent(victim, parent);
            {
                let n = self.nodes[victim.0].as_mut().unwrap();
                n.depth = depth;
                n.cnt = cnt;
            }
            if let Some(l) = left {
                self.set_parent(l, Some(victim));
            }
            if let Some(r) = right {
                self.set_parent(r, Some(victim));
            }

            match parent {
                Some(p) => {
                    self.replace_child(p, node, Some(victim));
                    root
                }
                None => Some(victim),
            }
        }
    }

    /// Returns the node at positional `offset` relative to `node` (0 is
    /// `node` itself), or `None` if out of range. Worst case O(log n)
    /// regardless of `offset`'s magnitude.
    pub fn offset(&self, node: AvlId, offset: i64) -> Option<AvlId> {
        let mut node = node;
        let mut pos: i64 = 0;
        while offset != pos {
            let right_cnt = self.cnt(self.right(node)) as i64;
            let left_cnt = self.cnt(self.left(node)) as i64;
            if pos < offset && pos + right_cnt >= offset {
                node = self.right(node)?;
                pos += self.cnt(self.left(node)) as i64 + 1;
            } else if pos > offset && pos - left_cnt <= offset {
                node = self.left(node)?;
                pos -= self.cnt(self.right(node)) as i64 + 1;
            } else {
                let parent = self.parent(node)?;
                if self.right(parent) == Some(node) {
                    pos -= self.cnt(self.left(node)) as i64 + 1;
                } else {
                    pos += self.cnt(self.right(node)) as i64 + 1;
                }
                node = parent;
            }
        }
        Some(node)
    }

    pub fn attach_as_child(&mut self, parent: AvlId, child: AvlId, go_left: bool) {
        if go_left {
            self.set_left(parent, Some(child));
        } else {
            self.set_right(parent, Some(child));
        }
        self.set_parent(child, Some(parent));
    }

    pub fn set_root(&mut self, id: AvlId) {
        self.root = Some(id);
    }

    pub fn min(&self, mut node: AvlId) -> AvlId {
        while let Some(l) = self.left(node) {
            node = l;
        }
        node
    }
}
