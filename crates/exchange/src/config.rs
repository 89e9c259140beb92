//! Exchange configuration parameters.
//!
//! These are compile-time/host choices. Governance-controlled values (fee
//! rates, creation fee) live in [`crate::params::Params`] in the store.

/// Configuration for the exchange core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Module name used to derive module-owned addresses.
    pub module_name: String,

    /// Maximum number of markets in a swap route.
    pub max_routing_hops: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            module_name: "exchange".to_string(),
            max_routing_hops: 3, // 3 markets (4 denoms in path)
        }
    }
}

impl ExchangeConfig {
    /// Create a new configuration with a custom module name.
    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = module_name.into();
        self
    }

    /// Create a new configuration with custom max routing hops.
    pub fn with_max_routing_hops(mut self, max_hops: usize) -> Self {
        self.max_routing_hops = max_hops;
        self
    }
}
