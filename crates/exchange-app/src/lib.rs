//! Message dispatcher for the exchange module.
//!
//! Decodes requests (typed [`Msg`]s or ABI calldata), runs each one
//! atomically against the exchange core, and turns the emitted events into
//! ABI-encoded logs attributed to [`EXCHANGE_MODULE_ADDRESS`].

pub mod abi;
pub mod handler;
pub mod types;

use alloy_primitives::{address, Address};

pub use abi::{decode_calldata, event_log, selectors, IExchange};
pub use handler::ExchangeHandler;
pub use types::{
    BlockResult, HandlerError, Msg, MsgCancelOrder, MsgCreateMarket, MsgPlaceLimitOrder,
    MsgPlaceMarketOrder, MsgResponse, MsgSetMarketFeeRates, MsgSwapExactIn, MsgUpdateParams,
    Query, QueryResponse, TxResult,
};

/// Address the exchange module's logs are emitted from.
pub const EXCHANGE_MODULE_ADDRESS: Address = address!("4200000000000000000000000000000000000042");
