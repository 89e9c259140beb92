//! In-memory backing store.

use super::{KvPair, KvStore};
use crate::types::B256;
use alloy::primitives::keccak256;
use std::collections::BTreeMap;

/// A `BTreeMap` backed store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash of the full contents, used to compare replicas and to check that
    /// simulation leaves no trace.
    pub fn root_hash(&self) -> B256 {
        let mut buf = Vec::new();
        for (key, value) in &self.entries {
            buf.extend_from_slice(&(key.len() as u64).to_be_bytes());
            buf.extend_from_slice(key);
            buf.extend_from_slice(&(value.len() as u64).to_be_bytes());
            buf.extend_from_slice(value);
        }
        keccak256(&buf)
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn iter_from<'a>(&'a self, start: &[u8]) -> Box<dyn Iterator<Item = KvPair> + 'a> {
        Box::new(
            self.entries
                .range(start.to_vec()..)
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }
}
