//! Resting limit orders.

use crate::codec::{decode_order, encode_order};
use crate::context::Context;
use crate::dec::Dec;
use crate::error::{ExchangeError, Result};
use crate::keys;
use crate::types::{Address, Amount, OrderSide};

/// A limit order resting in a market's book.
///
/// Market orders and fully matched limit orders never produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Unique, strictly increasing across all markets.
    pub id: u64,
    pub market_id: u64,
    /// Address that placed the order and receives its proceeds.
    pub orderer: Address,
    pub side: OrderSide,
    /// Limit price in quote per base.
    pub price: Dec,
    /// Base quantity requested at placement.
    pub quantity: Amount,
    /// Base quantity still open; `0 < open_quantity <= quantity`.
    pub open_quantity: Amount,
    /// Block height the order was placed at. Earlier heights match first.
    pub msg_height: u64,
    /// Amount escrowed when the order started resting: `open_quantity` base
    /// for sells, `ceil(price * open_quantity)` quote for buys.
    pub deposit: Amount,
    /// Part of `deposit` still held in escrow.
    pub remaining_deposit: Amount,
    /// Unix time at which the order expires, if it has a lifespan.
    pub deadline: Option<u64>,
}

impl Order {
    /// Base quantity filled so far.
    pub fn executed_quantity(&self) -> Amount {
        self.quantity - self.open_quantity
    }
}

/// Escrow required to back `quantity` at `price`: the base quantity for
/// sells, `ceil(price * quantity)` quote for buys.
pub fn deposit_amount(side: OrderSide, price: Dec, quantity: Amount) -> Result<Amount> {
    match side {
        OrderSide::Sell => Ok(quantity),
        OrderSide::Buy => price
            .mul_int_ceil(quantity)
            .ok_or(ExchangeError::Overflow("order deposit")),
    }
}

pub fn get_order(ctx: &mut Context<'_>, order_id: u64) -> Result<Option<Order>> {
    Ok(ctx
        .get(&keys::order_key(order_id))?
        .map(|bytes| decode_order(&bytes)))
}

/// Load an order or fail with `OrderNotFound`.
pub fn must_get_order(ctx: &mut Context<'_>, order_id: u64) -> Result<Order> {
    get_order(ctx, order_id)?.ok_or(ExchangeError::OrderNotFound(order_id))
}

pub(crate) fn set_order(ctx: &mut Context<'_>, order: &Order) -> Result<()> {
    ctx.set(keys::order_key(order.id), encode_order(order))
}
