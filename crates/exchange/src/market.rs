//! Market registry.

use crate::address::market_escrow_address;
use crate::bank::BankKeeper;
use crate::codec::{decode_market, decode_market_state, encode_market, encode_market_state};
use crate::context::Context;
use crate::dec::Dec;
use crate::error::{ExchangeError, Result};
use crate::events::Event;
use crate::exchange::Exchange;
use crate::keys;
use crate::params::FeeRates;
use crate::types::{validate_denom, Address, OrderSide};
use tracing::info;

/// A market for a (base, quote) denom pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    /// Dense id, starting at 1.
    pub id: u64,
    /// Denom being bought and sold.
    pub base_denom: String,
    /// Denom prices are expressed in.
    pub quote_denom: String,
    /// Holds the deposits of resting orders.
    pub escrow_address: Address,
    /// Per-market fee rates. `None` means the module defaults apply.
    pub fee_rates: Option<FeeRates>,
}

impl Market {
    /// Denom escrowed by an order on `side`: quote for buys, base for sells.
    pub fn deposit_denom(&self, side: OrderSide) -> &str {
        match side {
            OrderSide::Buy => &self.quote_denom,
            OrderSide::Sell => &self.base_denom,
        }
    }

    /// Denom received by an order on `side`.
    pub fn receive_denom(&self, side: OrderSide) -> &str {
        self.deposit_denom(side.opposite())
    }
}

/// Mutable market state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketState {
    /// Price of the most recent fill; `None` until the first fill.
    pub last_price: Option<Dec>,
}

pub fn get_market(ctx: &mut Context<'_>, market_id: u64) -> Result<Option<Market>> {
    Ok(ctx
        .get(&keys::market_key(market_id))?
        .map(|bytes| decode_market(&bytes)))
}

/// Load a market or fail with `MarketNotFound`.
pub fn must_get_market(ctx: &mut Context<'_>, market_id: u64) -> Result<Market> {
    get_market(ctx, market_id)?.ok_or(ExchangeError::MarketNotFound(market_id))
}

pub(crate) fn set_market(ctx: &mut Context<'_>, market: &Market) -> Result<()> {
    ctx.set(keys::market_key(market.id), encode_market(market))
}

/// State of an existing market.
///
/// Panics if the state is missing: every market gets its state when created.
pub fn must_get_market_state(ctx: &mut Context<'_>, market_id: u64) -> Result<MarketState> {
    match ctx.get(&keys::market_state_key(market_id))? {
        Some(bytes) => Ok(decode_market_state(&bytes)),
        None => panic!("market state not found: {market_id}"),
    }
}

pub(crate) fn set_market_state(
    ctx: &mut Context<'_>,
    market_id: u64,
    state: &MarketState,
) -> Result<()> {
    ctx.set(keys::market_state_key(market_id), encode_market_state(state))
}

/// Id of the market for the ordered pair (base, quote).
pub fn get_market_id_by_pair(
    ctx: &mut Context<'_>,
    base_denom: &str,
    quote_denom: &str,
) -> Result<Option<u64>> {
    let key = keys::market_by_pair_key(base_denom, quote_denom);
    Ok(ctx.get(&key)?.map(|bytes| match keys::decode_u64(&bytes) {
        Some(id) => id,
        None => panic!("corrupt market pair index for {base_denom}/{quote_denom}"),
    }))
}

impl<B: BankKeeper> Exchange<B> {
    /// Create a market for (base, quote).
    ///
    /// Fails with `InvalidPair` if the denoms are equal or the reverse market
    /// exists, and with `DuplicateMarket` if the market already exists. The
    /// market creation fee, if any, is sent from `creator` to the fee
    /// collector.
    pub fn create_market(
        &self,
        ctx: &mut Context<'_>,
        creator: Address,
        base_denom: &str,
        quote_denom: &str,
    ) -> Result<Market> {
        validate_denom(base_denom)?;
        validate_denom(quote_denom)?;
        if base_denom == quote_denom {
            return Err(ExchangeError::InvalidPair(format!(
                "base and quote denom must differ: {base_denom}"
            )));
        }

        ctx.atomic(|ctx| {
            if let Some(market_id) = get_market_id_by_pair(ctx, base_denom, quote_denom)? {
                return Err(ExchangeError::DuplicateMarket {
                    market_id,
                    base_denom: base_denom.to_string(),
                    quote_denom: quote_denom.to_string(),
                });
            }
            if let Some(market_id) = get_market_id_by_pair(ctx, quote_denom, base_denom)? {
                return Err(ExchangeError::InvalidPair(format!(
                    "reverse market {market_id} exists for {quote_denom}/{base_denom}"
                )));
            }
            for denom in [base_denom, quote_denom] {
                if !self.bank().has_supply(ctx, denom)? {
                    return Err(ExchangeError::InvalidDenom(format!(
                        "{denom} has no supply"
                    )));
                }
            }

            let params = self.get_params(ctx)?;
            if !params.market_creation_fee.is_empty() {
                self.bank().send_coins(
                    ctx,
                    creator,
                    self.fee_collector(),
                    params.market_creation_fee.as_slice(),
                )?;
            }

            let market_id = self.next_market_id(ctx)?;
            let market = Market {
                id: market_id,
                base_denom: base_denom.to_string(),
                quote_denom: quote_denom.to_string(),
                escrow_address: market_escrow_address(&self.config().module_name, market_id),
                fee_rates: None,
            };
            set_market(ctx, &market)?;
            set_market_state(ctx, market_id, &MarketState::default())?;
            ctx.set(
                keys::market_by_pair_key(base_denom, quote_denom),
                keys::encode_u64(market_id),
            )?;

            ctx.emit_event(Event::MarketCreated {
                market_id,
                base_denom: market.base_denom.clone(),
                quote_denom: market.quote_denom.clone(),
                creator,
                escrow_address: market.escrow_address,
            });
            info!(
                target: "exchange",
                market_id,
                base_denom,
                quote_denom,
                creator = ?creator,
                "Created market"
            );
            Ok(market)
        })
    }

    /// Fee rates in effect for `market`.
    pub fn fee_rates(&self, ctx: &mut Context<'_>, market: &Market) -> Result<FeeRates> {
        match market.fee_rates {
            Some(rates) => Ok(rates),
            None => Ok(self.get_params(ctx)?.default_fee_rates()),
        }
    }

    /// Install per-market fee rates, or revert to the module defaults with
    /// `None`.
    pub fn set_market_fee_rates(
        &self,
        ctx: &mut Context<'_>,
        market_id: u64,
        fee_rates: Option<FeeRates>,
    ) -> Result<Market> {
        if let Some(rates) = &fee_rates {
            rates.validate()?;
        }
        let mut market = must_get_market(ctx, market_id)?;
        market.fee_rates = fee_rates;
        set_market(ctx, &market)?;
        ctx.emit_event(Event::MarketFeeRatesUpdated {
            market_id,
            fee_rates,
        });
        info!(target: "exchange", market_id, fee_rates = ?fee_rates, "Updated market fee rates");
        Ok(market)
    }
}
