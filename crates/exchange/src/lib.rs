//! Deterministic spot exchange core.
//!
//! This library provides a store-backed central limit order book exchange:
//! - Market registry with per-market escrow addresses
//! - Limit and market orders matched in price-time priority
//! - Maker/taker fees with maker rebates
//! - Multi-hop exact-in swaps with simulation and best-route search
//!
//! All state lives in a [`KvStore`] accessed through a [`Context`], which
//! meters gas and buffers events. The exchange never touches wall-clock time
//! or randomness, so replaying the same requests yields the same state.

pub mod address;
pub mod bank;
pub mod codec;
pub mod config;
pub mod context;
pub mod dec;
pub mod error;
pub mod events;
pub mod exchange;
pub mod gas;
pub mod keys;
pub mod market;
pub mod matching;
pub mod order;
pub mod orderbook;
pub mod params;
pub mod query;
pub mod router;
pub mod settlement;
pub mod store;
pub mod types;

pub use bank::{BankKeeper, StoreBank};
pub use config::ExchangeConfig;
pub use context::{BlockHeader, Context};
pub use dec::{Dec, DecParseError};
pub use error::{ErrorKind, ExchangeError, Result};
pub use events::{Event, EventManager};
pub use exchange::{Exchange, LimitOrderResult, MarketOrderResult};
pub use gas::{GasConfig, GasMeter};
pub use market::{Market, MarketState};
pub use matching::Fill;
pub use order::Order;
pub use orderbook::OrderBook;
pub use params::{FeeRates, Params};
pub use query::{MarketResponse, OrderBookResponse, PageRequest, PageResponse, PriceLevel};
pub use router::{BestRoute, HopResult, RouteGraph, RouteHop, SwapResult};
pub use store::{CacheStore, KvStore, MemStore, ScratchStore};
pub use types::{Address, Amount, Coin, Coins, OrderSide, B256, U256};
