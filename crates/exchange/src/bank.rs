//! Fungible-token bank adapter.
//!
//! The exchange only needs to check supplies, read balances and move coins.
//! [`StoreBank`] keeps balances in the same store as the exchange, so they
//! roll back and simulate together with exchange state.

use crate::codec::{decode_amount, encode_amount};
use crate::context::Context;
use crate::error::{ExchangeError, Result};
use crate::types::{Address, Amount, Coin};

/// Capability surface the exchange needs from the token module.
pub trait BankKeeper {
    /// Whether any amount of `denom` exists.
    fn has_supply(&self, ctx: &mut Context<'_>, denom: &str) -> Result<bool>;

    fn balance(&self, ctx: &mut Context<'_>, address: Address, denom: &str) -> Result<Amount>;

    /// Move `coins` from `from` to `to`, failing with `InsufficientFunds`
    /// if `from` cannot cover any of them.
    fn send_coins(
        &self,
        ctx: &mut Context<'_>,
        from: Address,
        to: Address,
        coins: &[Coin],
    ) -> Result<()>;
}

const BALANCE_KEY_PREFIX: &[u8] = b"bank/balances/";
const SUPPLY_KEY_PREFIX: &[u8] = b"bank/supply/";

fn balance_key(address: Address, denom: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(BALANCE_KEY_PREFIX.len() + 20 + denom.len());
    key.extend_from_slice(BALANCE_KEY_PREFIX);
    key.extend_from_slice(address.as_slice());
    key.extend_from_slice(denom.as_bytes());
    key
}

fn supply_key(denom: &str) -> Vec<u8> {
    let mut key = SUPPLY_KEY_PREFIX.to_vec();
    key.extend_from_slice(denom.as_bytes());
    key
}

/// Bank kept in the exchange's own store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreBank;

impl StoreBank {
    pub fn new() -> Self {
        Self
    }

    pub fn supply(&self, ctx: &mut Context<'_>, denom: &str) -> Result<Amount> {
        Ok(ctx
            .get(&supply_key(denom))?
            .map(|bytes| decode_amount(&bytes))
            .unwrap_or_default())
    }

    /// Create coins and credit them to `to`.
    pub fn mint_coins(&self, ctx: &mut Context<'_>, to: Address, coins: &[Coin]) -> Result<()> {
        for coin in coins.iter().filter(|coin| !coin.is_zero()) {
            coin.validate()?;
            let supply = self
                .supply(ctx, &coin.denom)?
                .checked_add(coin.amount)
                .ok_or(ExchangeError::Overflow("supply"))?;
            ctx.set(supply_key(&coin.denom), encode_amount(supply))?;
            self.add_balance(ctx, to, coin)?;
        }
        Ok(())
    }

    fn set_balance(
        &self,
        ctx: &mut Context<'_>,
        address: Address,
        denom: &str,
        amount: Amount,
    ) -> Result<()> {
        let key = balance_key(address, denom);
        if amount.is_zero() {
            ctx.delete(&key)
        } else {
            ctx.set(key, encode_amount(amount))
        }
    }

    fn add_balance(&self, ctx: &mut Context<'_>, address: Address, coin: &Coin) -> Result<()> {
        let balance = self
            .balance(ctx, address, &coin.denom)?
            .checked_add(coin.amount)
            .ok_or(ExchangeError::Overflow("balance"))?;
        self.set_balance(ctx, address, &coin.denom, balance)
    }

    fn sub_balance(&self, ctx: &mut Context<'_>, address: Address, coin: &Coin) -> Result<()> {
        let available = self.balance(ctx, address, &coin.denom)?;
        let remaining =
            available
                .checked_sub(coin.amount)
                .ok_or_else(|| ExchangeError::InsufficientFunds {
                    address,
                    denom: coin.denom.clone(),
                    available,
                    required: coin.amount,
                })?;
        self.set_balance(ctx, address, &coin.denom, remaining)
    }
}

impl BankKeeper for StoreBank {
    fn has_supply(&self, ctx: &mut Context<'_>, denom: &str) -> Result<bool> {
        ctx.has(&supply_key(denom))
    }

    fn balance(&self, ctx: &mut Context<'_>, address: Address, denom: &str) -> Result<Amount> {
        Ok(ctx
            .get(&balance_key(address, denom))?
            .map(|bytes| decode_amount(&bytes))
            .unwrap_or_default())
    }

    fn send_coins(
        &self,
        ctx: &mut Context<'_>,
        from: Address,
        to: Address,
        coins: &[Coin],
    ) -> Result<()> {
        for coin in coins.iter().filter(|coin| !coin.is_zero()) {
            self.sub_balance(ctx, from, coin)?;
            self.add_balance(ctx, to, coin)?;
        }
        Ok(())
    }
}
