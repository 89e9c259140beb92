//! Gas metering for store access.

use crate::error::{ExchangeError, Result};

/// Gas charged per store operation (the Cosmos KV gas table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasConfig {
    pub has_cost: u64,
    pub delete_cost: u64,
    pub read_cost_flat: u64,
    pub read_cost_per_byte: u64,
    pub write_cost_flat: u64,
    pub write_cost_per_byte: u64,
    pub iter_next_cost_flat: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            has_cost: 1000,
            delete_cost: 1000,
            read_cost_flat: 1000,
            read_cost_per_byte: 3,
            write_cost_flat: 2000,
            write_cost_per_byte: 30,
            iter_next_cost_flat: 30,
        }
    }
}

impl GasConfig {
    /// A table that charges nothing.
    pub fn free() -> Self {
        Self {
            has_cost: 0,
            delete_cost: 0,
            read_cost_flat: 0,
            read_cost_per_byte: 0,
            write_cost_flat: 0,
            write_cost_per_byte: 0,
            iter_next_cost_flat: 0,
        }
    }

    pub fn read_cost(&self, key_len: usize, value_len: usize) -> u64 {
        let bytes = (key_len + value_len) as u64;
        self.read_cost_flat
            .saturating_add(self.read_cost_per_byte.saturating_mul(bytes))
    }

    pub fn write_cost(&self, key_len: usize, value_len: usize) -> u64 {
        let bytes = (key_len + value_len) as u64;
        self.write_cost_flat
            .saturating_add(self.write_cost_per_byte.saturating_mul(bytes))
    }

    /// Cost of stepping an iterator onto an entry.
    pub fn iter_cost(&self, key_len: usize, value_len: usize) -> u64 {
        let bytes = (key_len + value_len) as u64;
        self.iter_next_cost_flat
            .saturating_add(self.read_cost_per_byte.saturating_mul(bytes))
    }
}

/// Tracks gas consumed against a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    limit: u64,
    consumed: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, consumed: 0 }
    }

    pub fn infinite() -> Self {
        Self::new(u64::MAX)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    /// Charge `amount`. Once the limit is exceeded the meter stays exhausted and
    /// every further charge fails.
    pub fn consume(&mut self, amount: u64) -> Result<()> {
        let wanted = self.consumed.saturating_add(amount);
        if wanted > self.limit {
            self.consumed = wanted;
            return Err(ExchangeError::OutOfGas {
                limit: self.limit,
                wanted,
            });
        }
        self.consumed = wanted;
        Ok(())
    }

    pub fn is_out_of_gas(&self) -> bool {
        self.consumed > self.limit
    }
}
