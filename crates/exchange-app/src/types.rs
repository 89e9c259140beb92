//! Request, response and error types of the exchange dispatcher.

use alloy_primitives::{Address, Log};
use exchange::{
    Amount, BestRoute, Coin, Dec, ErrorKind, Event, ExchangeError, FeeRates, LimitOrderResult,
    Market, MarketOrderResult, MarketResponse, Order, OrderBookResponse, PageRequest,
    PageResponse, Params, SwapResult,
};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgCreateMarket {
    pub sender: String,
    pub base_denom: String,
    pub quote_denom: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgPlaceLimitOrder {
    pub sender: String,
    pub market_id: u64,
    pub is_buy: bool,
    pub price: Dec,
    pub quantity: Amount,
    /// Seconds until the resting order expires. `None` rests until filled
    /// or cancelled.
    pub lifespan: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgPlaceMarketOrder {
    pub sender: String,
    pub market_id: u64,
    pub is_buy: bool,
    pub quantity: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgCancelOrder {
    pub sender: String,
    pub order_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgSwapExactIn {
    pub sender: String,
    pub routes: Vec<u64>,
    pub input: Coin,
    pub min_output: Coin,
}

/// Replace the module parameters. Authority only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgUpdateParams {
    pub authority: String,
    pub params: Params,
}

/// Override a market's fee rates, or clear the override with `None`.
/// Authority only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgSetMarketFeeRates {
    pub authority: String,
    pub market_id: u64,
    pub fee_rates: Option<FeeRates>,
}

/// A state-changing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    CreateMarket(MsgCreateMarket),
    PlaceLimitOrder(MsgPlaceLimitOrder),
    PlaceMarketOrder(MsgPlaceMarketOrder),
    CancelOrder(MsgCancelOrder),
    SwapExactIn(MsgSwapExactIn),
    UpdateParams(MsgUpdateParams),
    SetMarketFeeRates(MsgSetMarketFeeRates),
}

impl Msg {
    /// Hex address of the signer.
    pub fn sender(&self) -> &str {
        match self {
            Msg::CreateMarket(msg) => &msg.sender,
            Msg::PlaceLimitOrder(msg) => &msg.sender,
            Msg::PlaceMarketOrder(msg) => &msg.sender,
            Msg::CancelOrder(msg) => &msg.sender,
            Msg::SwapExactIn(msg) => &msg.sender,
            Msg::UpdateParams(msg) => &msg.authority,
            Msg::SetMarketFeeRates(msg) => &msg.authority,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Msg::CreateMarket(_) => "create_market",
            Msg::PlaceLimitOrder(_) => "place_limit_order",
            Msg::PlaceMarketOrder(_) => "place_market_order",
            Msg::CancelOrder(_) => "cancel_order",
            Msg::SwapExactIn(_) => "swap_exact_in",
            Msg::UpdateParams(_) => "update_params",
            Msg::SetMarketFeeRates(_) => "set_market_fee_rates",
        }
    }

    /// Stateless checks. Returns the parsed signer.
    pub fn validate_basic(&self) -> Result<Address, HandlerError> {
        let sender = parse_address(self.sender())?;
        match self {
            Msg::CreateMarket(msg) => {
                exchange::types::validate_denom(&msg.base_denom)?;
                exchange::types::validate_denom(&msg.quote_denom)?;
            }
            Msg::PlaceLimitOrder(msg) => {
                exchange::params::validate_price(msg.price)?;
                if msg.quantity.is_zero() {
                    return Err(ExchangeError::InvalidQuantity(msg.quantity).into());
                }
                if msg.lifespan == Some(0) {
                    return Err(ExchangeError::InvalidLifespan.into());
                }
            }
            Msg::PlaceMarketOrder(msg) => {
                if msg.quantity.is_zero() {
                    return Err(ExchangeError::InvalidQuantity(msg.quantity).into());
                }
            }
            Msg::CancelOrder(_) => {}
            Msg::SwapExactIn(msg) => {
                if msg.routes.is_empty() {
                    return Err(HandlerError::InvalidRequest("routes must not be empty".to_string()));
                }
                msg.input.validate()?;
                msg.min_output.validate()?;
            }
            Msg::UpdateParams(msg) => msg.params.validate()?,
            Msg::SetMarketFeeRates(msg) => {
                if let Some(rates) = &msg.fee_rates {
                    rates.validate()?;
                }
            }
        }
        Ok(sender)
    }
}

/// Parse a hex account address. The zero address is not an account.
pub fn parse_address(address: &str) -> Result<Address, HandlerError> {
    let parsed = Address::from_str(address).map_err(|err| HandlerError::InvalidSender {
        address: address.to_string(),
        reason: err.to_string(),
    })?;
    if parsed == Address::ZERO {
        return Err(HandlerError::InvalidSender {
            address: address.to_string(),
            reason: "zero address".to_string(),
        });
    }
    Ok(parsed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsgResponse {
    CreateMarket(Market),
    PlaceLimitOrder(LimitOrderResult),
    PlaceMarketOrder(MarketOrderResult),
    CancelOrder(Order),
    SwapExactIn(SwapResult),
    UpdateParams,
    SetMarketFeeRates(Market),
}

/// Outcome of a successful transaction.
#[derive(Debug, Clone)]
pub struct TxResult {
    pub response: MsgResponse,
    pub events: Vec<Event>,
    pub logs: Vec<Log>,
    pub gas_used: u64,
}

/// Outcome of the end-of-block hook.
#[derive(Debug, Clone, Default)]
pub struct BlockResult {
    pub expired_orders: Vec<u64>,
    pub events: Vec<Event>,
    pub logs: Vec<Log>,
}

/// A read-only request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Params,
    Market { market_id: u64 },
    Markets { page: PageRequest },
    Order { order_id: u64 },
    OrdersByOrderer { orderer: String, market_id: Option<u64> },
    /// A depth of zero returns every price level.
    OrderBook { market_id: u64, depth: usize },
    AllRoutes { denom_in: String, denom_out: String },
    SimulateSwapExactIn {
        sender: String,
        routes: Vec<u64>,
        input: Coin,
        min_output: Coin,
    },
    BestSwapExactInRoutes { input: Coin, min_output: Coin },
    Balance { address: String, denom: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResponse {
    Params(Params),
    Market(MarketResponse),
    Markets {
        markets: Vec<MarketResponse>,
        page: PageResponse,
    },
    Order(Order),
    Orders(Vec<Order>),
    OrderBook(OrderBookResponse),
    Routes(Vec<Vec<u64>>),
    Swap(SwapResult),
    BestRoute(BestRoute),
    Balance(Coin),
}

/// Errors returned by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Invalid calldata: {0}")]
    InvalidCalldata(String),

    #[error("Invalid sender {address}: {reason}")]
    InvalidSender { address: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0} is not the module authority")]
    Unauthorized(Address),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::InvalidCalldata(_)
            | HandlerError::InvalidSender { .. }
            | HandlerError::InvalidRequest(_) => ErrorKind::InvalidArgument,
            HandlerError::Unauthorized(_) => ErrorKind::Unauthorized,
            HandlerError::Exchange(err) => err.kind(),
        }
    }
}
