//! The exchange keeper: module parameters, id sequences and the order
//! lifecycle (placement, cancellation, expiry).

use crate::address::fee_collector_address;
use crate::bank::{BankKeeper, StoreBank};
use crate::codec::{decode_params, encode_params};
use crate::config::ExchangeConfig;
use crate::context::Context;
use crate::dec::Dec;
use crate::error::{ExchangeError, Result};
use crate::events::Event;
use crate::keys;
use crate::market::{must_get_market, Market};
use crate::matching::{emit_fill_events, execute_orders, Budget, Fill, Taker};
use crate::order::{deposit_amount, get_order, must_get_order, Order};
use crate::orderbook::OrderBook;
use crate::params::{validate_price, Params};
use crate::settlement::Settlement;
use crate::types::{Address, Amount, Coin, OrderSide};
use std::ops::ControlFlow;
use tracing::info;

/// Result of placing a limit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitOrderResult {
    /// The resting order, if any quantity was left after matching.
    pub order: Option<Order>,
    pub executed_quantity: Amount,
    pub executed_quote: Amount,
    pub fills: Vec<Fill>,
}

impl LimitOrderResult {
    pub fn rested(&self) -> bool {
        self.order.is_some()
    }

    pub fn order_id(&self) -> Option<u64> {
        self.order.as_ref().map(|order| order.id)
    }
}

/// Result of placing a market order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketOrderResult {
    pub executed_quantity: Amount,
    pub executed_quote: Amount,
    pub fills: Vec<Fill>,
}

/// The spot exchange.
///
/// Holds no state of its own: everything lives in the store behind the
/// [`Context`] passed to each call.
#[derive(Debug, Clone, Default)]
pub struct Exchange<B = StoreBank> {
    bank: B,
    config: ExchangeConfig,
}

impl<B: BankKeeper> Exchange<B> {
    /// Create an exchange with the default configuration.
    pub fn new(bank: B) -> Self {
        Self::with_config(bank, ExchangeConfig::default())
    }

    pub fn with_config(bank: B, config: ExchangeConfig) -> Self {
        Self { bank, config }
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Receives market creation fees and the protocol's share of trading fees.
    pub fn fee_collector(&self) -> Address {
        fee_collector_address(&self.config.module_name)
    }

    /// Module parameters; the defaults until [`Exchange::set_params`] is called.
    pub fn get_params(&self, ctx: &mut Context<'_>) -> Result<Params> {
        Ok(ctx
            .get(keys::PARAMS_KEY)?
            .map(|bytes| decode_params(&bytes))
            .unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context<'_>, params: Params) -> Result<()> {
        params.validate()?;
        ctx.set(keys::PARAMS_KEY.to_vec(), encode_params(&params))?;
        info!(
            target: "exchange",
            market_creation_fee = %params.market_creation_fee,
            default_maker_fee_rate = %params.default_maker_fee_rate,
            default_taker_fee_rate = %params.default_taker_fee_rate,
            "Updated params"
        );
        Ok(())
    }

    fn next_sequence(&self, ctx: &mut Context<'_>, key: &[u8]) -> Result<u64> {
        let last = match ctx.get(key)? {
            Some(bytes) => match keys::decode_u64(&bytes) {
                Some(id) => id,
                None => panic!("corrupt sequence at 0x{}", hex::encode(key)),
            },
            None => 0,
        };
        let next = last
            .checked_add(1)
            .ok_or(ExchangeError::Overflow("sequence"))?;
        ctx.set(key.to_vec(), keys::encode_u64(next))?;
        Ok(next)
    }

    pub fn last_market_id(&self, ctx: &mut Context<'_>) -> Result<u64> {
        Ok(ctx
            .get(keys::LAST_MARKET_ID_KEY)?
            .and_then(|bytes| keys::decode_u64(&bytes))
            .unwrap_or(0))
    }

    pub fn last_order_id(&self, ctx: &mut Context<'_>) -> Result<u64> {
        Ok(ctx
            .get(keys::LAST_ORDER_ID_KEY)?
            .and_then(|bytes| keys::decode_u64(&bytes))
            .unwrap_or(0))
    }

    pub(crate) fn next_market_id(&self, ctx: &mut Context<'_>) -> Result<u64> {
        self.next_sequence(ctx, keys::LAST_MARKET_ID_KEY)
    }

    pub(crate) fn next_order_id(&self, ctx: &mut Context<'_>) -> Result<u64> {
        self.next_sequence(ctx, keys::LAST_ORDER_ID_KEY)
    }

    /// Place a limit order.
    ///
    /// The full deposit is escrowed, the order is matched against crossing
    /// resting orders, and any residual quantity rests in the book under a
    /// newly allocated id. With a `lifespan` (seconds) the resting order
    /// expires at `block_time + lifespan`.
    #[allow(clippy::too_many_arguments)]
    pub fn place_limit_order(
        &self,
        ctx: &mut Context<'_>,
        market_id: u64,
        orderer: Address,
        side: OrderSide,
        price: Dec,
        quantity: Amount,
        lifespan: Option<u64>,
    ) -> Result<LimitOrderResult> {
        validate_price(price)?;
        if quantity.is_zero() {
            return Err(ExchangeError::InvalidQuantity(quantity));
        }
        if lifespan == Some(0) {
            return Err(ExchangeError::InvalidLifespan);
        }

        ctx.atomic(|ctx| {
            let market = must_get_market(ctx, market_id)?;
            let deposit_denom = market.deposit_denom(side).to_string();
            let deposit = deposit_amount(side, price, quantity)?;
            self.bank.send_coins(
                ctx,
                orderer,
                market.escrow_address,
                &[Coin::new(deposit_denom.clone(), deposit)],
            )?;

            let mut settlement = Settlement::new(market.escrow_address);
            settlement.credit(orderer, &deposit_denom, deposit)?;

            let taker = Taker {
                address: orderer,
                side,
                price_limit: Some(price),
            };
            let fee_rates = self.fee_rates(ctx, &market)?;
            let outcome = execute_orders(
                ctx,
                &market,
                fee_rates,
                &taker,
                Budget::Quantity(quantity),
                &mut settlement,
                self.fee_collector(),
            )?;

            let residual = quantity
                .checked_sub(outcome.executed_quantity)
                .ok_or_else(|| ExchangeError::Internal("executed more than ordered".into()))?;
            let order = if residual.is_zero() {
                None
            } else {
                let rest_deposit = deposit_amount(side, price, residual)?;
                settlement.debit(orderer, &deposit_denom, rest_deposit)?;
                let deadline = lifespan
                    .map(|secs| {
                        ctx.block_time()
                            .checked_add(secs)
                            .ok_or(ExchangeError::Overflow("deadline"))
                    })
                    .transpose()?;
                let order = Order {
                    id: self.next_order_id(ctx)?,
                    market_id,
                    orderer,
                    side,
                    price,
                    quantity,
                    open_quantity: residual,
                    msg_height: ctx.block_height(),
                    deposit: rest_deposit,
                    remaining_deposit: rest_deposit,
                    deadline,
                };
                OrderBook::new(market_id).insert_order(ctx, &order)?;
                Some(order)
            };

            settlement.apply(ctx, &self.bank)?;

            let order_id = order.as_ref().map(|order| order.id);
            emit_fill_events(ctx, &market, &taker, order_id, &outcome.fills);
            ctx.emit_event(Event::OrderPlaced {
                order_id,
                market_id,
                orderer,
                side,
                price,
                quantity,
                executed_quantity: outcome.executed_quantity,
                executed_quote: outcome.executed_quote,
                rested: order.is_some(),
                deadline: order.as_ref().and_then(|order| order.deadline),
            });
            info!(
                target: "exchange",
                market_id,
                order_id = ?order_id,
                orderer = ?orderer,
                %side,
                %price,
                %quantity,
                executed_quantity = %outcome.executed_quantity,
                executed_quote = %outcome.executed_quote,
                "Placed limit order"
            );

            Ok(LimitOrderResult {
                order,
                executed_quantity: outcome.executed_quantity,
                executed_quote: outcome.executed_quote,
                fills: outcome.fills,
            })
        })
    }

    /// Place a market order for `quantity` base.
    ///
    /// The order walks the book without a price limit and never rests: an
    /// empty or shallow book simply executes less, down to zero. Sells escrow
    /// `quantity` base up front; buys pay for what they execute.
    pub fn place_market_order(
        &self,
        ctx: &mut Context<'_>,
        market_id: u64,
        orderer: Address,
        side: OrderSide,
        quantity: Amount,
    ) -> Result<MarketOrderResult> {
        if quantity.is_zero() {
            return Err(ExchangeError::InvalidQuantity(quantity));
        }

        ctx.atomic(|ctx| {
            let market = must_get_market(ctx, market_id)?;
            let mut settlement = Settlement::new(market.escrow_address);
            if side == OrderSide::Sell {
                self.bank.send_coins(
                    ctx,
                    orderer,
                    market.escrow_address,
                    &[Coin::new(market.base_denom.clone(), quantity)],
                )?;
                settlement.credit(orderer, &market.base_denom, quantity)?;
            }

            let taker = Taker {
                address: orderer,
                side,
                price_limit: None,
            };
            let fee_rates = self.fee_rates(ctx, &market)?;
            let outcome = execute_orders(
                ctx,
                &market,
                fee_rates,
                &taker,
                Budget::Quantity(quantity),
                &mut settlement,
                self.fee_collector(),
            )?;
            settlement.apply(ctx, &self.bank)?;

            emit_fill_events(ctx, &market, &taker, None, &outcome.fills);
            ctx.emit_event(Event::MarketOrderPlaced {
                market_id,
                orderer,
                side,
                quantity,
                executed_quantity: outcome.executed_quantity,
                executed_quote: outcome.executed_quote,
            });
            info!(
                target: "exchange",
                market_id,
                orderer = ?orderer,
                %side,
                %quantity,
                executed_quantity = %outcome.executed_quantity,
                executed_quote = %outcome.executed_quote,
                "Placed market order"
            );

            Ok(MarketOrderResult {
                executed_quantity: outcome.executed_quantity,
                executed_quote: outcome.executed_quote,
                fills: outcome.fills,
            })
        })
    }

    /// Remove `order` from the book and return its remaining deposit.
    /// Returns the refunded (base, quote) amounts.
    fn close_order(
        &self,
        ctx: &mut Context<'_>,
        market: &Market,
        order: &Order,
    ) -> Result<(Amount, Amount)> {
        OrderBook::new(market.id).remove_order(ctx, order)?;
        let refund = Coin::new(market.deposit_denom(order.side), order.remaining_deposit);
        self.bank
            .send_coins(ctx, market.escrow_address, order.orderer, &[refund])?;
        Ok(match order.side {
            OrderSide::Buy => (Amount::ZERO, order.remaining_deposit),
            OrderSide::Sell => (order.remaining_deposit, Amount::ZERO),
        })
    }

    /// Cancel a resting order. Only its orderer may cancel it.
    ///
    /// Returns the order as it was when cancelled.
    pub fn cancel_order(
        &self,
        ctx: &mut Context<'_>,
        canceller: Address,
        order_id: u64,
    ) -> Result<Order> {
        ctx.atomic(|ctx| {
            let order = must_get_order(ctx, order_id)?;
            if order.orderer != canceller {
                return Err(ExchangeError::Unauthorized {
                    order_id,
                    sender: canceller,
                });
            }
            let market = must_get_market(ctx, order.market_id)?;
            let (refunded_base, refunded_quote) = self.close_order(ctx, &market, &order)?;

            ctx.emit_event(Event::OrderCancelled {
                order_id,
                market_id: market.id,
                orderer: order.orderer,
                refunded_base,
                refunded_quote,
            });
            info!(
                target: "exchange",
                order_id,
                market_id = market.id,
                orderer = ?order.orderer,
                %refunded_base,
                %refunded_quote,
                "Cancelled order"
            );
            Ok(order)
        })
    }

    /// Remove every order whose deadline is at or before the block time,
    /// refunding its deposit. Called by the host at the end of each block.
    ///
    /// Returns the ids of the expired orders in deadline order.
    pub fn cancel_expired_orders(&self, ctx: &mut Context<'_>) -> Result<Vec<u64>> {
        let now = ctx.block_time();
        let mut expired = Vec::new();
        ctx.scan_prefix(&keys::orders_by_deadline_prefix(), |key, _| {
            match keys::parse_orders_by_deadline_key(key) {
                Some((deadline, order_id)) if deadline <= now => {
                    expired.push(order_id);
                    ControlFlow::Continue(())
                }
                Some(_) => ControlFlow::Break(()),
                None => panic!("malformed deadline index key: 0x{}", hex::encode(key)),
            }
        })?;

        ctx.atomic(|ctx| {
            for &order_id in &expired {
                let Some(order) = get_order(ctx, order_id)? else {
                    panic!("order {order_id} indexed by deadline but missing");
                };
                let market = must_get_market(ctx, order.market_id)?;
                let (refunded_base, refunded_quote) = self.close_order(ctx, &market, &order)?;
                ctx.emit_event(Event::OrderExpired {
                    order_id,
                    market_id: market.id,
                    orderer: order.orderer,
                    refunded_base,
                    refunded_quote,
                });
            }
            Ok(())
        })?;

        if !expired.is_empty() {
            info!(target: "exchange", count = expired.len(), block_time = now, "Expired orders");
        }
        Ok(expired)
    }
}
