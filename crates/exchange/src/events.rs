//! Events emitted by exchange operations.

use crate::dec::Dec;
use crate::params::FeeRates;
use crate::types::{Address, Amount, Coin, OrderSide};

/// A structured event. Hosts translate these into their own log format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    MarketCreated {
        market_id: u64,
        base_denom: String,
        quote_denom: String,
        creator: Address,
        escrow_address: Address,
    },
    /// `None` reverts the market to the module defaults.
    MarketFeeRatesUpdated {
        market_id: u64,
        fee_rates: Option<FeeRates>,
    },
    /// A limit order was placed. `order_id` is set only if the order rested.
    OrderPlaced {
        order_id: Option<u64>,
        market_id: u64,
        orderer: Address,
        side: OrderSide,
        price: Dec,
        quantity: Amount,
        executed_quantity: Amount,
        executed_quote: Amount,
        rested: bool,
        deadline: Option<u64>,
    },
    MarketOrderPlaced {
        market_id: u64,
        orderer: Address,
        side: OrderSide,
        quantity: Amount,
        executed_quantity: Amount,
        executed_quote: Amount,
    },
    /// One fill against a resting order, at the maker's price.
    ///
    /// `taker_fee`, `maker_fee` and `maker_rebate` share a denom; at most one
    /// of the maker amounts is non-zero.
    OrderFilled {
        market_id: u64,
        taker_order_id: Option<u64>,
        maker_order_id: u64,
        taker: Address,
        maker: Address,
        taker_side: OrderSide,
        price: Dec,
        quantity: Amount,
        quote_amount: Amount,
        taker_fee: Coin,
        maker_fee: Coin,
        maker_rebate: Coin,
    },
    OrderCancelled {
        order_id: u64,
        market_id: u64,
        orderer: Address,
        refunded_base: Amount,
        refunded_quote: Amount,
    },
    OrderExpired {
        order_id: u64,
        market_id: u64,
        orderer: Address,
        refunded_base: Amount,
        refunded_quote: Amount,
    },
    SwapExecuted {
        orderer: Address,
        routes: Vec<u64>,
        input: Coin,
        output: Coin,
    },
}

impl Event {
    /// Short, stable name of the event type.
    pub fn name(&self) -> &'static str {
        match self {
            Event::MarketCreated { .. } => "market_created",
            Event::MarketFeeRatesUpdated { .. } => "market_fee_rates_updated",
            Event::OrderPlaced { .. } => "order_placed",
            Event::MarketOrderPlaced { .. } => "market_order_placed",
            Event::OrderFilled { .. } => "order_filled",
            Event::OrderCancelled { .. } => "order_cancelled",
            Event::OrderExpired { .. } => "order_expired",
            Event::SwapExecuted { .. } => "swap_executed",
        }
    }
}

/// Buffer of events emitted during a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventManager {
    events: Vec<Event>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append events from a committed nested scope.
    pub fn extend(&mut self, other: EventManager) {
        self.events.extend(other.events);
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}
