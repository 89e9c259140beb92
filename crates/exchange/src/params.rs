//! Module parameters and price bounds.

use crate::dec::{pow10, Dec};
use crate::error::{ExchangeError, Result};
use crate::types::Coins;

/// `10^-14`, the smallest admissible price.
pub fn min_price() -> Dec {
    Dec::new_with_prec(1, 14)
}

/// `10^40`, the largest admissible price.
pub fn max_price() -> Dec {
    Dec::from_raw(pow10(58))
}

/// Check `min_price() <= price <= max_price()`.
pub fn validate_price(price: Dec) -> Result<()> {
    if price < min_price() || price > max_price() {
        return Err(ExchangeError::InvalidPrice(price));
    }
    Ok(())
}

/// Maker/taker fee rates in effect for a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRates {
    /// May be negative, in which case makers receive a rebate.
    pub maker: Dec,
    pub taker: Dec,
}

impl FeeRates {
    pub fn new(maker: Dec, taker: Dec) -> Self {
        Self { maker, taker }
    }

    /// Maker in [-1, 1], taker in [0, 1], and a maker rebate never exceeds
    /// the taker fee.
    pub fn validate(&self) -> Result<()> {
        let one = Dec::one();
        if self.maker > one || self.maker < one.neg() {
            return Err(ExchangeError::InvalidParams(format!(
                "maker fee rate must be in [-1, 1]: {}",
                self.maker
            )));
        }
        if self.taker > one || self.taker.is_negative() {
            return Err(ExchangeError::InvalidParams(format!(
                "taker fee rate must be in [0, 1]: {}",
                self.taker
            )));
        }
        if self.maker.is_negative() && self.maker.neg() > self.taker {
            return Err(ExchangeError::InvalidParams(format!(
                "minus maker fee rate must not exceed taker fee rate: {} > {}",
                self.maker.neg(),
                self.taker
            )));
        }
        Ok(())
    }
}

/// Governance-controlled module parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    /// Charged to the creator of a market, sent to the fee collector.
    pub market_creation_fee: Coins,
    pub default_maker_fee_rate: Dec,
    pub default_taker_fee_rate: Dec,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            market_creation_fee: Coins::default(),
            default_maker_fee_rate: Dec::new_with_prec(-15, 4), // -0.15%
            default_taker_fee_rate: Dec::new_with_prec(3, 3),   // 0.3%
        }
    }
}

impl Params {
    pub fn default_fee_rates(&self) -> FeeRates {
        FeeRates::new(self.default_maker_fee_rate, self.default_taker_fee_rate)
    }

    pub fn validate(&self) -> Result<()> {
        for coin in self.market_creation_fee.iter() {
            coin.validate()
                .map_err(|err| ExchangeError::InvalidParams(format!("market creation fee: {err}")))?;
        }
        self.default_fee_rates().validate()
    }
}
