//! Core type definitions for the exchange.
//!
//! Re-exports from alloy-primitives for addresses and 256-bit amounts.

use crate::error::{ExchangeError, Result};
use std::fmt;
use std::str::FromStr;

pub use alloy::primitives::{Address, B256, U256};

/// Amount of an asset in its smallest unit. Amounts are never negative.
pub type Amount = U256;

/// Maximum length of a denomination, including the leading letter.
pub const MAX_DENOM_LEN: usize = 128;

/// Validate a denomination: a letter followed by 2-127 characters from
/// `[a-zA-Z0-9/:._-]`.
pub fn validate_denom(denom: &str) -> Result<()> {
    let mut chars = denom.chars();
    let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_rest =
        chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'));
    if !valid_first || !valid_rest || denom.len() < 3 || denom.len() > MAX_DENOM_LEN {
        return Err(ExchangeError::InvalidDenom(denom.to_string()));
    }
    Ok(())
}

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderSide {
    /// Buys base with quote.
    Buy,
    /// Sells base for quote.
    Sell,
}

impl OrderSide {
    pub fn from_is_buy(is_buy: bool) -> Self {
        if is_buy {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    pub fn is_buy(self) -> bool {
        self == OrderSide::Buy
    }

    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// An amount of a single denomination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coin {
    pub denom: String,
    pub amount: Amount,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Amount) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Convenience constructor for literal amounts.
    pub fn from_u128(denom: impl Into<String>, amount: u128) -> Self {
        Self::new(denom, U256::from(amount))
    }

    pub fn zero(denom: impl Into<String>) -> Self {
        Self::new(denom, U256::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn validate(&self) -> Result<()> {
        validate_denom(&self.denom)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = ExchangeError;

    /// Parses `"100uatom"`.
    fn from_str(s: &str) -> Result<Self> {
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ExchangeError::InvalidCoin(s.to_string()))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() {
            return Err(ExchangeError::InvalidCoin(s.to_string()));
        }
        let amount = amount
            .parse::<U256>()
            .map_err(|_| ExchangeError::InvalidCoin(s.to_string()))?;
        validate_denom(denom)?;
        Ok(Coin::new(denom, amount))
    }
}

/// A set of coins sorted by denom, without zero amounts or duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Build a coin set, rejecting duplicate denoms and dropping zero amounts.
    pub fn new(coins: Vec<Coin>) -> Result<Self> {
        let mut coins: Vec<Coin> = coins.into_iter().filter(|c| !c.is_zero()).collect();
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        for coin in &coins {
            coin.validate()?;
        }
        if coins.windows(2).any(|w| w[0].denom == w[1].denom) {
            return Err(ExchangeError::InvalidCoin("duplicate denom".to_string()));
        }
        Ok(Self(coins))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Coin] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    /// Amount of `denom` in the set (zero if absent).
    pub fn amount_of(&self, denom: &str) -> Amount {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount)
            .unwrap_or(U256::ZERO)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}
