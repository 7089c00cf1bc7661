//! Data structures backing the keyspace: an arena-based AVL tree for ordered
//! data, an incrementally-rehashed hash map, a sorted set built from the two,
//! and a back-reference min-heap for TTL expiry.

pub mod avl;
pub mod hashmap;
pub mod heap;
pub mod zset;

pub use avl::{AvlId, AvlTree};
pub use hashmap::HMap;
pub use heap::Heap;
pub use zset::ZSet;
