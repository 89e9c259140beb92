//! Ordered key-value store abstraction.
//!
//! The exchange keeps all of its state, bank balances included, in a single
//! [`KvStore`]. [`MemStore`] is the in-memory backing store and [`CacheStore`]
//! a copy-on-write overlay used for atomic requests and simulation.
//! [`ScratchStore`] is the same overlay over a shared borrow, for read paths.

mod cache;
mod memory;

pub use cache::{CacheStore, ScratchStore};
pub use memory::MemStore;

/// A key-value pair yielded by store iteration.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Ordered key-value store.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    /// Entries with `key >= start`, in ascending key order.
    fn iter_from<'a>(&'a self, start: &[u8]) -> Box<dyn Iterator<Item = KvPair> + 'a>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Entries whose key starts with `prefix`, in ascending key order.
    fn iter_prefix<'a>(&'a self, prefix: &[u8]) -> Box<dyn Iterator<Item = KvPair> + 'a> {
        let owned = prefix.to_vec();
        Box::new(
            self.iter_from(prefix)
                .take_while(move |(key, _)| key.starts_with(&owned)),
        )
    }
}

/// The smallest key strictly greater than `key`.
pub fn key_successor(key: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(0);
    next
}
