//! Deterministic derivation of module-owned addresses.

use crate::types::Address;
use alloy::primitives::keccak256;

/// Address owned by `module` for the given purpose `key`:
/// the last 20 bytes of `keccak256(module || 0x00 || key)`.
pub fn module_address(module: &str, key: &[u8]) -> Address {
    let mut preimage = Vec::with_capacity(module.len() + 1 + key.len());
    preimage.extend_from_slice(module.as_bytes());
    preimage.push(0);
    preimage.extend_from_slice(key);
    let hash = keccak256(&preimage);
    Address::from_slice(&hash[12..])
}

/// Escrow address of a market, holding the deposits of its resting orders.
pub fn market_escrow_address(module: &str, market_id: u64) -> Address {
    module_address(module, format!("MarketEscrowAddress/{market_id}").as_bytes())
}

/// Collector of market creation fees and the protocol's share of trading fees.
pub fn fee_collector_address(module: &str) -> Address {
    module_address(module, b"FeeCollector")
}
