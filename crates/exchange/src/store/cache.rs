//! Copy-on-write overlay store.

use super::{KvPair, KvStore};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;
use tracing::trace;

/// Buffers writes and deletions over a parent store.
///
/// Reads see pending changes first. [`CacheStore::write`] flushes them into
/// the parent; dropping the overlay discards them.
pub struct CacheStore<'a, S: KvStore + ?Sized> {
    parent: &'a mut S,
    /// `None` marks a deletion.
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore + ?Sized> CacheStore<'a, S> {
    pub fn new(parent: &'a mut S) -> Self {
        Self {
            parent,
            pending: BTreeMap::new(),
        }
    }

    /// Flush buffered changes into the parent store.
    pub fn write(self) {
        trace!(target: "exchange", entries = self.pending.len(), "committing cache store");
        for (key, value) in self.pending {
            match value {
                Some(value) => self.parent.set(key, value),
                None => self.parent.delete(&key),
            }
        }
    }
}

impl<S: KvStore + ?Sized> KvStore for CacheStore<'_, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.get(key) {
            Some(value) => value.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), None);
    }

    fn iter_from<'b>(&'b self, start: &[u8]) -> Box<dyn Iterator<Item = KvPair> + 'b> {
        merged(&*self.parent, &self.pending, start)
    }
}

/// Buffers writes over a parent it only borrows shared.
///
/// Used where callers need a mutable store for work whose changes are thrown
/// away, such as queries. There is no way to commit the buffer.
pub struct ScratchStore<'a, S: KvStore + ?Sized> {
    parent: &'a S,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore + ?Sized> ScratchStore<'a, S> {
    pub fn new(parent: &'a S) -> Self {
        Self {
            parent,
            pending: BTreeMap::new(),
        }
    }
}

impl<S: KvStore + ?Sized> KvStore for ScratchStore<'_, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.get(key) {
            Some(value) => value.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), None);
    }

    fn iter_from<'b>(&'b self, start: &[u8]) -> Box<dyn Iterator<Item = KvPair> + 'b> {
        merged(self.parent, &self.pending, start)
    }
}

fn merged<'b, S: KvStore + ?Sized>(
    parent: &'b S,
    pending: &'b BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    start: &[u8],
) -> Box<dyn Iterator<Item = KvPair> + 'b> {
    let pending = pending
        .range(start.to_vec()..)
        .map(|(k, v)| (k.clone(), v.clone()));
    Box::new(MergeIter {
        parent: parent.iter_from(start).peekable(),
        pending: pending.peekable(),
    })
}

/// Merges the parent's entries with pending changes in key order. A pending
/// entry shadows the parent entry with the same key.
struct MergeIter<P, C>
where
    P: Iterator<Item = KvPair>,
    C: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    parent: Peekable<P>,
    pending: Peekable<C>,
}

impl<P, C> Iterator for MergeIter<P, C>
where
    P: Iterator<Item = KvPair>,
    C: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    type Item = KvPair;

    fn next(&mut self) -> Option<KvPair> {
        loop {
            let order = match (self.parent.peek(), self.pending.peek()) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((pk, _)), Some((ck, _))) => pk.cmp(ck),
            };
            match order {
                Ordering::Less => return self.parent.next(),
                Ordering::Equal => {
                    self.parent.next();
                }
                Ordering::Greater => {}
            }
            if let Some((key, value)) = self.pending.next() {
                if let Some(value) = value {
                    return Some((key, value));
                }
            }
        }
    }
}
