//! Request execution context.
//!
//! A [`Context`] is what the host hands the core for one request: exclusive
//! access to the store, the current block header, a gas meter and an event
//! buffer. Every store access goes through the context so it is metered.

use crate::error::Result;
use crate::events::{Event, EventManager};
use crate::gas::{GasConfig, GasMeter};
use crate::store::{key_successor, CacheStore, KvPair, KvStore};
use std::ops::ControlFlow;

/// Height and time of the block being executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: u64,
    /// Unix time in seconds.
    pub time: u64,
}

impl BlockHeader {
    pub fn new(height: u64, time: u64) -> Self {
        Self { height, time }
    }
}

pub struct Context<'a> {
    store: &'a mut dyn KvStore,
    header: BlockHeader,
    gas_config: GasConfig,
    gas_meter: GasMeter,
    events: EventManager,
}

impl<'a> Context<'a> {
    /// A context with an unlimited gas meter and the default gas table.
    pub fn new(store: &'a mut dyn KvStore, header: BlockHeader) -> Self {
        Self {
            store,
            header,
            gas_config: GasConfig::default(),
            gas_meter: GasMeter::infinite(),
            events: EventManager::new(),
        }
    }

    pub fn with_gas_limit(mut self, limit: u64) -> Self {
        self.gas_meter = GasMeter::new(limit);
        self
    }

    pub fn with_gas_config(mut self, gas_config: GasConfig) -> Self {
        self.gas_config = gas_config;
        self
    }

    pub fn header(&self) -> BlockHeader {
        self.header
    }

    pub fn block_height(&self) -> u64 {
        self.header.height
    }

    pub fn block_time(&self) -> u64 {
        self.header.time
    }

    pub fn gas_meter(&self) -> &GasMeter {
        &self.gas_meter
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn emit_event(&mut self, event: Event) {
        self.events.emit(event);
    }

    /// Drain the buffered events.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events).into_events()
    }

    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.store.get(key);
        let value_len = value.as_ref().map_or(0, Vec::len);
        self.gas_meter
            .consume(self.gas_config.read_cost(key.len(), value_len))?;
        Ok(value)
    }

    pub fn has(&mut self, key: &[u8]) -> Result<bool> {
        self.gas_meter.consume(self.gas_config.has_cost)?;
        Ok(self.store.has(key))
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.gas_meter
            .consume(self.gas_config.write_cost(key.len(), value.len()))?;
        self.store.set(key, value);
        Ok(())
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.gas_meter.consume(self.gas_config.delete_cost)?;
        self.store.delete(key);
        Ok(())
    }

    /// Visit entries under `prefix` with `key >= start`, in key order, until
    /// the visitor breaks or the prefix is exhausted.
    pub fn scan_from<F>(&mut self, prefix: &[u8], start: &[u8], mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    {
        let start = if start < prefix { prefix } else { start };
        let gas_config = self.gas_config;
        for (key, value) in self.store.iter_from(start) {
            if !key.starts_with(prefix) {
                break;
            }
            self.gas_meter
                .consume(gas_config.iter_cost(key.len(), value.len()))?;
            if visit(&key, &value).is_break() {
                break;
            }
        }
        Ok(())
    }

    pub fn scan_prefix<F>(&mut self, prefix: &[u8], visit: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    {
        self.scan_from(prefix, prefix, visit)
    }

    /// First entry under `prefix`.
    pub fn first_in_prefix(&mut self, prefix: &[u8]) -> Result<Option<KvPair>> {
        self.seek_in_prefix(prefix, prefix)
    }

    /// First entry under `prefix` whose key is strictly greater than `after`.
    pub fn next_in_prefix(&mut self, prefix: &[u8], after: &[u8]) -> Result<Option<KvPair>> {
        self.seek_in_prefix(prefix, &key_successor(after))
    }

    /// First entry under `prefix` whose key is at or after `start`.
    pub fn seek_in_prefix(&mut self, prefix: &[u8], start: &[u8]) -> Result<Option<KvPair>> {
        let mut found = None;
        self.scan_from(prefix, start, |key, value| {
            found = Some((key.to_vec(), value.to_vec()));
            ControlFlow::Break(())
        })?;
        Ok(found)
    }

    /// Run `f` in a copy-on-write overlay. Writes and events are committed
    /// only if `f` succeeds; gas is charged either way.
    pub fn atomic<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Context<'_>) -> Result<T>,
    {
        let mut cache = CacheStore::new(&mut *self.store);
        let mut inner = Context {
            store: &mut cache,
            header: self.header,
            gas_config: self.gas_config,
            gas_meter: self.gas_meter,
            events: EventManager::new(),
        };
        let result = f(&mut inner);
        let gas_meter = inner.gas_meter;
        let events = std::mem::take(&mut inner.events);
        drop(inner);

        self.gas_meter = gas_meter;
        if result.is_ok() {
            cache.write();
            self.events.extend(events);
        }
        result
    }

    /// Run `f` in an overlay that is always discarded, events included. Gas
    /// consumed by the simulation is still charged.
    pub fn simulate<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Context<'_>) -> Result<T>,
    {
        let mut cache = CacheStore::new(&mut *self.store);
        let mut inner = Context {
            store: &mut cache,
            header: self.header,
            gas_config: self.gas_config,
            gas_meter: self.gas_meter,
            events: EventManager::new(),
        };
        let result = f(&mut inner);
        self.gas_meter = inner.gas_meter;
        result
    }
}
