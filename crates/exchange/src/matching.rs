//! Matching engine.
//!
//! An incoming order (the taker) is matched against the opposite side of the
//! book in price-time priority. Every fill executes at the resting order's
//! price. Balance movements are recorded in a [`Settlement`]; makers are paid
//! out of the deposits they left in escrow.
//!
//! Rounding, for a fill of base quantity `q` at maker price `P`:
//! - taker buys: quote `Q = ceil(q * P)`, taker fee `ceil(taker_rate * Q)` quote
//! - taker sells: quote `Q = floor(q * P)`, taker fee `ceil(taker_rate * q)` base
//! - the maker fee or rebate is `floor(|maker_rate| * leg)` of what the maker
//!   receives, which is the denom the taker pays its fee in.
//!
//! A rebate never exceeds the taker fee while `-maker_rate <= taker_rate`, so
//! the fee collector's take is never negative.

use crate::context::Context;
use crate::dec::Dec;
use crate::error::{ExchangeError, Result};
use crate::events::Event;
use crate::market::{must_get_market_state, set_market_state, Market};
use crate::orderbook::{crosses, OrderBook};
use crate::params::FeeRates;
use crate::settlement::Settlement;
use crate::types::{Address, Amount, Coin, OrderSide};
use std::ops::ControlFlow;
use tracing::debug;

/// How much of the book a taker may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Fill up to this base quantity; fees are paid on top.
    Quantity(Amount),
    /// Sell for at most this much base, taker fee included.
    BaseFunds(Amount),
    /// Buy with at most this much quote, taker fee included.
    QuoteFunds(Amount),
}

impl Budget {
    pub fn amount(&self) -> Amount {
        match *self {
            Budget::Quantity(amount) | Budget::BaseFunds(amount) | Budget::QuoteFunds(amount) => {
                amount
            }
        }
    }
}

/// The incoming side of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Taker {
    pub address: Address,
    pub side: OrderSide,
    /// Limit price; `None` for market orders and swaps.
    pub price_limit: Option<Dec>,
}

/// One execution against a resting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub maker_order_id: u64,
    pub maker: Address,
    pub price: Dec,
    /// Base quantity.
    pub quantity: Amount,
    pub quote_amount: Amount,
    /// Fee amounts below are denominated in what the taker pays.
    pub taker_fee: Amount,
    pub maker_fee: Amount,
    pub maker_rebate: Amount,
}

/// Result of matching a taker against the book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Total base quantity filled.
    pub executed_quantity: Amount,
    /// Total quote amount exchanged, before fees.
    pub executed_quote: Amount,
    /// What the taker pays, taker fees included.
    pub paid: Amount,
    /// What the taker receives.
    pub received: Amount,
    pub fills: Vec<Fill>,
}

fn overflow(what: &'static str) -> ExchangeError {
    ExchangeError::Overflow(what)
}

fn underflow(what: &str) -> ExchangeError {
    ExchangeError::Internal(format!("{what} underflow"))
}

fn taker_fee(rate: Dec, amount: Amount) -> Result<Amount> {
    rate.mul_int_ceil(amount).ok_or(overflow("taker fee"))
}

/// Largest `x` such that `x + ceil(taker_fee_rate * x) <= budget`.
pub fn max_spend_before_fee(budget: Amount, taker_fee_rate: Dec) -> Result<Amount> {
    if taker_fee_rate.is_zero() {
        return Ok(budget);
    }
    let fits = |x: Amount| -> Result<bool> {
        let fee = taker_fee(taker_fee_rate, x)?;
        Ok(x.checked_add(fee).is_some_and(|total| total <= budget))
    };
    let one_plus_rate = Dec::one()
        .checked_add(taker_fee_rate)
        .ok_or(overflow("fee rate"))?;
    let mut spend = one_plus_rate
        .int_quo_floor(budget)
        .ok_or(overflow("spend before fee"))?;
    while !spend.is_zero() && !fits(spend)? {
        spend -= Amount::from(1u64);
    }
    while spend < budget && fits(spend + Amount::from(1u64))? {
        spend += Amount::from(1u64);
    }
    Ok(spend)
}

/// Amounts of a single fill.
struct FillAmounts {
    quantity: Amount,
    quote: Amount,
    /// Paid by the taker, before its fee.
    taker_pays: Amount,
    taker_fee: Amount,
    taker_receives: Amount,
    /// What the maker's counter leg is worth before its fee or rebate.
    maker_leg: Amount,
    /// Taken out of the maker's remaining deposit.
    maker_pays: Amount,
}

fn size_fill(
    taker_side: OrderSide,
    budget: &Budget,
    remaining: Amount,
    open_quantity: Amount,
    price: Dec,
    taker_rate: Dec,
) -> Result<Option<FillAmounts>> {
    let quantity = match (taker_side, budget) {
        (_, Budget::Quantity(_)) => remaining.min(open_quantity),
        (OrderSide::Sell, Budget::BaseFunds(_)) => {
            open_quantity.min(max_spend_before_fee(remaining, taker_rate)?)
        }
        (OrderSide::Buy, Budget::QuoteFunds(_)) => {
            let spend = max_spend_before_fee(remaining, taker_rate)?;
            let affordable = price.int_quo_floor(spend).ok_or(overflow("fill quantity"))?;
            open_quantity.min(affordable)
        }
        (side, budget) => {
            return Err(ExchangeError::Internal(format!(
                "{budget:?} cannot fund a {side} taker"
            )))
        }
    };
    if quantity.is_zero() {
        return Ok(None);
    }

    let amounts = match taker_side {
        OrderSide::Buy => {
            let quote = price.mul_int_ceil(quantity).ok_or(overflow("fill quote"))?;
            FillAmounts {
                quantity,
                quote,
                taker_pays: quote,
                taker_fee: taker_fee(taker_rate, quote)?,
                taker_receives: quantity,
                maker_leg: quote,
                maker_pays: quantity,
            }
        }
        OrderSide::Sell => {
            let quote = price.mul_int_floor(quantity).ok_or(overflow("fill quote"))?;
            FillAmounts {
                quantity,
                quote,
                taker_pays: quantity,
                taker_fee: taker_fee(taker_rate, quantity)?,
                taker_receives: quote,
                maker_leg: quantity,
                maker_pays: quote,
            }
        }
    };
    Ok(Some(amounts))
}

/// Match `taker` against the book of `market` until the budget is spent, the
/// book no longer crosses, or a fill would be empty.
///
/// Records every balance movement in `settlement`, updates or removes the
/// makers and sets the market's last price to the price of the last fill.
pub(crate) fn execute_orders(
    ctx: &mut Context<'_>,
    market: &Market,
    fee_rates: FeeRates,
    taker: &Taker,
    budget: Budget,
    settlement: &mut Settlement,
    fee_collector: Address,
) -> Result<MatchOutcome> {
    let book = OrderBook::new(market.id);
    let pay_denom = market.deposit_denom(taker.side);
    let receive_denom = market.receive_denom(taker.side);
    let mut remaining = budget.amount();
    let mut outcome = MatchOutcome::default();
    let mut last_price = None;
    let accepts = |price: Dec| {
        taker
            .price_limit
            .map_or(true, |limit| crosses(taker.side, limit, price))
    };
    book.walk(ctx, taker.side, accepts, |ctx, mut maker| {
        if remaining.is_zero() {
            return Ok(ControlFlow::Break(()));
        }
        let Some(fill) = size_fill(
            taker.side,
            &budget,
            remaining,
            maker.open_quantity,
            maker.price,
            fee_rates.taker,
        )?
        else {
            return Ok(ControlFlow::Break(()));
        };

        let maker_fee_amount = fee_rates
            .maker
            .mul_int_floor(fill.maker_leg)
            .ok_or(overflow("maker fee"))?;
        let (maker_fee, maker_rebate) = if fee_rates.maker.is_negative() {
            (Amount::ZERO, maker_fee_amount)
        } else {
            (maker_fee_amount, Amount::ZERO)
        };
        let maker_receives = (fill.maker_leg + maker_rebate)
            .checked_sub(maker_fee)
            .ok_or_else(|| underflow("maker proceeds"))?;
        let protocol_take = (fill.taker_fee + maker_fee)
            .checked_sub(maker_rebate)
            .ok_or_else(|| underflow("protocol fee"))?;
        let taker_total = fill
            .taker_pays
            .checked_add(fill.taker_fee)
            .ok_or(overflow("taker payment"))?;

        settlement.debit(taker.address, pay_denom, taker_total)?;
        settlement.credit(taker.address, receive_denom, fill.taker_receives)?;
        settlement.credit(maker.orderer, pay_denom, maker_receives)?;
        settlement.credit(fee_collector, pay_denom, protocol_take)?;

        maker.open_quantity = maker
            .open_quantity
            .checked_sub(fill.quantity)
            .ok_or_else(|| underflow("maker open quantity"))?;
        maker.remaining_deposit = maker
            .remaining_deposit
            .checked_sub(fill.maker_pays)
            .ok_or_else(|| underflow("maker deposit"))?;
        if maker.open_quantity.is_zero() {
            // Rounding dust left from a buy deposit goes back to the maker.
            settlement.credit(maker.orderer, receive_denom, maker.remaining_deposit)?;
            book.remove_order(ctx, &maker)?;
        } else {
            book.update_order(ctx, &maker)?;
        }

        remaining = match budget {
            Budget::Quantity(_) => remaining.checked_sub(fill.quantity),
            Budget::BaseFunds(_) | Budget::QuoteFunds(_) => remaining.checked_sub(taker_total),
        }
        .ok_or_else(|| underflow("taker budget"))?;

        debug!(
            target: "exchange",
            market_id = market.id,
            maker_order_id = maker.id,
            taker_side = %taker.side,
            price = %maker.price,
            quantity = %fill.quantity,
            quote = %fill.quote,
            taker_fee = %fill.taker_fee,
            maker_fee = %maker_fee,
            maker_rebate = %maker_rebate,
            "Order filled"
        );

        outcome.executed_quantity += fill.quantity;
        outcome.executed_quote += fill.quote;
        outcome.paid += taker_total;
        outcome.received += fill.taker_receives;
        outcome.fills.push(Fill {
            maker_order_id: maker.id,
            maker: maker.orderer,
            price: maker.price,
            quantity: fill.quantity,
            quote_amount: fill.quote,
            taker_fee: fill.taker_fee,
            maker_fee,
            maker_rebate,
        });
        last_price = Some(maker.price);
        Ok(if remaining.is_zero() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        })
    })?;

    if let Some(price) = last_price {
        let mut state = must_get_market_state(ctx, market.id)?;
        state.last_price = Some(price);
        set_market_state(ctx, market.id, &state)?;
    }
    Ok(outcome)
}

/// Emit an `OrderFilled` event per fill.
pub(crate) fn emit_fill_events(
    ctx: &mut Context<'_>,
    market: &Market,
    taker: &Taker,
    taker_order_id: Option<u64>,
    fills: &[Fill],
) {
    let fee_denom = market.deposit_denom(taker.side);
    for fill in fills {
        ctx.emit_event(Event::OrderFilled {
            market_id: market.id,
            taker_order_id,
            maker_order_id: fill.maker_order_id,
            taker: taker.address,
            maker: fill.maker,
            taker_side: taker.side,
            price: fill.price,
            quantity: fill.quantity,
            quote_amount: fill.quote_amount,
            taker_fee: Coin::new(fee_denom, fill.taker_fee),
            maker_fee: Coin::new(fee_denom, fill.maker_fee),
            maker_rebate: Coin::new(fee_denom, fill.maker_rebate),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BlockHeader;
    use crate::market::{set_market, MarketState};
    use crate::order::{get_order, Order};
    use crate::store::{KvPair, KvStore, MemStore};
    use crate::types::U256;
    use std::cell::Cell;

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    fn amount(n: u64) -> Amount {
        U256::from(n)
    }

    fn default_rates() -> FeeRates {
        FeeRates::new(dec("-0.0015"), dec("0.003"))
    }

    fn market() -> Market {
        Market {
            id: 1,
            base_denom: "uatom".to_string(),
            quote_denom: "uusd".to_string(),
            escrow_address: Address::repeat_byte(0xe5),
            fee_rates: None,
        }
    }

    fn setup(ctx: &mut Context<'_>) -> Market {
        let market = market();
        set_market(ctx, &market).unwrap();
        set_market_state(ctx, market.id, &MarketState::default()).unwrap();
        market
    }

    fn rest(ctx: &mut Context<'_>, id: u64, side: OrderSide, price: &str, qty: u64) -> Order {
        let price = dec(price);
        let deposit = crate::order::deposit_amount(side, price, amount(qty)).unwrap();
        let order = Order {
            id,
            market_id: 1,
            orderer: Address::repeat_byte(id as u8),
            side,
            price,
            quantity: amount(qty),
            open_quantity: amount(qty),
            msg_height: 1,
            deposit,
            remaining_deposit: deposit,
            deadline: None,
        };
        OrderBook::new(1).insert_order(ctx, &order).unwrap();
        order
    }

    #[test]
    fn test_max_spend_before_fee() {
        let rate = dec("0.003");
        // 9 + ceil(0.027) = 10
        assert_eq!(max_spend_before_fee(amount(10), rate).unwrap(), amount(9));
        // 333 + ceil(0.999) = 334 <= 335, but 334 + ceil(1.002) = 336
        assert_eq!(max_spend_before_fee(amount(335), rate).unwrap(), amount(333));
        assert_eq!(max_spend_before_fee(amount(1000), rate).unwrap(), amount(997));
        assert_eq!(max_spend_before_fee(amount(1), rate).unwrap(), amount(0));
        assert_eq!(max_spend_before_fee(amount(7), Dec::ZERO).unwrap(), amount(7));
        assert!(max_spend_before_fee(U256::MAX, rate).unwrap() > U256::ZERO);
    }

    #[test]
    fn test_partial_fill_of_resting_sell() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(2, 0));
        let market = setup(&mut ctx);
        let maker = rest(&mut ctx, 1, OrderSide::Sell, "1.5", 100);
        let bob = Address::repeat_byte(0xb0);
        let collector = Address::repeat_byte(0xfc);

        let taker = Taker {
            address: bob,
            side: OrderSide::Buy,
            price_limit: Some(dec("1.5")),
        };
        let mut settlement = Settlement::new(market.escrow_address);
        let outcome = execute_orders(
            &mut ctx,
            &market,
            default_rates(),
            &taker,
            Budget::Quantity(amount(40)),
            &mut settlement,
            collector,
        )
        .unwrap();

        assert_eq!(outcome.executed_quantity, amount(40));
        assert_eq!(outcome.executed_quote, amount(60));
        assert_eq!(outcome.paid, amount(61));
        assert_eq!(outcome.received, amount(40));
        let fill = &outcome.fills[0];
        assert_eq!(fill.taker_fee, amount(1));
        assert_eq!(fill.maker_rebate, amount(0));

        assert_eq!(settlement.net(bob, "uusd"), (amount(61), false));
        assert_eq!(settlement.net(bob, "uatom"), (amount(40), true));
        assert_eq!(settlement.net(maker.orderer, "uusd"), (amount(60), true));
        assert_eq!(settlement.net(collector, "uusd"), (amount(1), true));

        let maker = get_order(&mut ctx, 1).unwrap().unwrap();
        assert_eq!(maker.open_quantity, amount(60));
        assert_eq!(maker.remaining_deposit, amount(60));
        assert_eq!(
            must_get_market_state(&mut ctx, 1).unwrap().last_price,
            Some(dec("1.5"))
        );
    }

    /// A store that counts the entries it yields through iteration.
    #[derive(Default)]
    struct CountingStore {
        inner: MemStore,
        yielded: Cell<usize>,
    }

    impl KvStore for CountingStore {
        fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
            self.inner.set(key, value);
        }

        fn delete(&mut self, key: &[u8]) {
            self.inner.delete(key);
        }

        fn iter_from<'a>(&'a self, start: &[u8]) -> Box<dyn Iterator<Item = KvPair> + 'a> {
            let yielded = &self.yielded;
            Box::new(
                self.inner
                    .iter_from(start)
                    .inspect(move |_| yielded.set(yielded.get() + 1)),
            )
        }
    }

    #[test]
    fn test_sweep_scans_each_maker_once() {
        let makers = 3_000u64;
        let mut store = CountingStore::default();
        let market = {
            let mut ctx = Context::new(&mut store, BlockHeader::new(2, 0));
            let market = setup(&mut ctx);
            for id in 1..=makers {
                rest(&mut ctx, id, OrderSide::Sell, "1", 1);
            }
            market
        };
        store.yielded.set(0);

        let taker = Taker {
            address: Address::repeat_byte(0xd0),
            side: OrderSide::Buy,
            price_limit: None,
        };
        let mut settlement = Settlement::new(market.escrow_address);
        let outcome = {
            let mut ctx = Context::new(&mut store, BlockHeader::new(3, 0));
            // Makers consumed earlier in the sweep are deletions pending in
            // the overlay; the sweep must not walk over them again.
            ctx.atomic(|ctx| {
                execute_orders(
                    ctx,
                    &market,
                    FeeRates::new(Dec::ZERO, Dec::ZERO),
                    &taker,
                    Budget::Quantity(amount(makers)),
                    &mut settlement,
                    Address::repeat_byte(0xfc),
                )
            })
            .unwrap()
        };

        assert_eq!(outcome.fills.len(), makers as usize);
        assert_eq!(outcome.executed_quantity, amount(makers));
        let ids: Vec<u64> = outcome.fills.iter().map(|f| f.maker_order_id).collect();
        assert_eq!(ids, (1..=makers).collect::<Vec<_>>());
        let yielded = store.yielded.get();
        assert!(
            yielded <= 2 * makers as usize + 2,
            "{yielded} entries scanned for {makers} fills"
        );

        let mut ctx = Context::new(&mut store, BlockHeader::new(3, 0));
        assert!(OrderBook::new(market.id)
            .orders(&mut ctx, OrderSide::Sell)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_walks_price_levels_until_limit() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(2, 0));
        let market = setup(&mut ctx);
        rest(&mut ctx, 1, OrderSide::Buy, "1.2", 10);
        rest(&mut ctx, 2, OrderSide::Buy, "1.1", 10);
        rest(&mut ctx, 3, OrderSide::Buy, "1.0", 10);

        let taker = Taker {
            address: Address::repeat_byte(0xd0),
            side: OrderSide::Sell,
            price_limit: Some(dec("1.1")),
        };
        let mut settlement = Settlement::new(market.escrow_address);
        let outcome = execute_orders(
            &mut ctx,
            &market,
            FeeRates::new(Dec::ZERO, Dec::ZERO),
            &taker,
            Budget::Quantity(amount(100)),
            &mut settlement,
            Address::repeat_byte(0xfc),
        )
        .unwrap();

        assert_eq!(outcome.executed_quantity, amount(20));
        // floor(10 * 1.2) + floor(10 * 1.1)
        assert_eq!(outcome.executed_quote, amount(23));
        let makers: Vec<u64> = outcome.fills.iter().map(|f| f.maker_order_id).collect();
        assert_eq!(makers, vec![1, 2]);
        assert!(get_order(&mut ctx, 1).unwrap().is_none());
        assert!(get_order(&mut ctx, 3).unwrap().is_some());
        assert_eq!(
            must_get_market_state(&mut ctx, 1).unwrap().last_price,
            Some(dec("1.1"))
        );
    }

    #[test]
    fn test_quote_funded_buy_fits_fee_in_budget() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(2, 0));
        let market = setup(&mut ctx);
        rest(&mut ctx, 1, OrderSide::Sell, "2", 100);

        let taker = Taker {
            address: Address::repeat_byte(0xd0),
            side: OrderSide::Buy,
            price_limit: None,
        };
        let mut settlement = Settlement::new(market.escrow_address);
        let outcome = execute_orders(
            &mut ctx,
            &market,
            default_rates(),
            &taker,
            Budget::QuoteFunds(amount(100)),
            &mut settlement,
            Address::repeat_byte(0xfc),
        )
        .unwrap();

        // spend = 99 (99 + ceil(0.297) = 100), q = floor(99 / 2) = 49, Q = 98,
        // fee = ceil(0.294) = 1.
        assert_eq!(outcome.executed_quantity, amount(49));
        assert_eq!(outcome.paid, amount(99));
        assert!(outcome.paid <= amount(100));
        assert_eq!(outcome.received, amount(49));
    }

    #[test]
    fn test_full_fill_refunds_deposit_dust() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(2, 0));
        let market = setup(&mut ctx);
        // Deposit ceil(1.5 * 3) = 5 quote.
        let maker = rest(&mut ctx, 1, OrderSide::Buy, "1.5", 3);
        let seller = Address::repeat_byte(0xd0);

        let taker = Taker {
            address: seller,
            side: OrderSide::Sell,
            price_limit: None,
        };
        let mut settlement = Settlement::new(market.escrow_address);
        let outcome = execute_orders(
            &mut ctx,
            &market,
            FeeRates::new(Dec::ZERO, Dec::ZERO),
            &taker,
            Budget::Quantity(amount(3)),
            &mut settlement,
            Address::repeat_byte(0xfc),
        )
        .unwrap();

        // Seller receives floor(4.5) = 4, the maker gets 3 base plus 1 quote of dust.
        assert_eq!(outcome.received, amount(4));
        assert_eq!(settlement.net(maker.orderer, "uatom"), (amount(3), true));
        assert_eq!(settlement.net(maker.orderer, "uusd"), (amount(1), true));
        assert!(get_order(&mut ctx, 1).unwrap().is_none());
    }

    #[test]
    fn test_positive_maker_fee_goes_to_collector() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(2, 0));
        let market = setup(&mut ctx);
        let maker = rest(&mut ctx, 1, OrderSide::Sell, "1", 1000);
        let collector = Address::repeat_byte(0xfc);

        let taker = Taker {
            address: Address::repeat_byte(0xd0),
            side: OrderSide::Buy,
            price_limit: None,
        };
        let mut settlement = Settlement::new(market.escrow_address);
        execute_orders(
            &mut ctx,
            &market,
            FeeRates::new(dec("0.001"), dec("0.002")),
            &taker,
            Budget::Quantity(amount(1000)),
            &mut settlement,
            collector,
        )
        .unwrap();

        assert_eq!(settlement.net(maker.orderer, "uusd"), (amount(999), true));
        assert_eq!(settlement.net(collector, "uusd"), (amount(3), true));
    }

    #[test]
    fn test_empty_book() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(2, 0));
        let market = setup(&mut ctx);
        let taker = Taker {
            address: Address::repeat_byte(0xd0),
            side: OrderSide::Buy,
            price_limit: None,
        };
        let mut settlement = Settlement::new(market.escrow_address);
        let outcome = execute_orders(
            &mut ctx,
            &market,
            default_rates(),
            &taker,
            Budget::Quantity(amount(1000)),
            &mut settlement,
            Address::repeat_byte(0xfc),
        )
        .unwrap();
        assert_eq!(outcome, MatchOutcome::default());
        assert_eq!(must_get_market_state(&mut ctx, 1).unwrap().last_price, None);
    }
}
