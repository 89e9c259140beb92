//! Per-request balance ledger settled through a market escrow.
//!
//! Matching records who owes and who is owed rather than moving coins fill by
//! fill. [`Settlement::apply`] then nets each (address, denom) and moves the
//! differences: every net debit is paid into the escrow first, then every net
//! credit is paid out of it, so the escrow never runs short mid-settlement.

use crate::bank::BankKeeper;
use crate::context::Context;
use crate::error::{ExchangeError, Result};
use crate::types::{Address, Amount, Coin};
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entry {
    credit: Amount,
    debit: Amount,
}

/// Balance movements of one request on one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    escrow: Address,
    entries: BTreeMap<(Address, String), Entry>,
}

impl Settlement {
    pub fn new(escrow: Address) -> Self {
        Self {
            escrow,
            entries: BTreeMap::new(),
        }
    }

    fn entry(&mut self, address: Address, denom: &str) -> &mut Entry {
        self.entries
            .entry((address, denom.to_string()))
            .or_default()
    }

    /// Record that `address` is owed `amount` of `denom`.
    pub fn credit(&mut self, address: Address, denom: &str, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let entry = self.entry(address, denom);
        entry.credit = entry
            .credit
            .checked_add(amount)
            .ok_or(ExchangeError::Overflow("settlement credit"))?;
        Ok(())
    }

    /// Record that `address` owes `amount` of `denom`.
    pub fn debit(&mut self, address: Address, denom: &str, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let entry = self.entry(address, denom);
        entry.debit = entry
            .debit
            .checked_add(amount)
            .ok_or(ExchangeError::Overflow("settlement debit"))?;
        Ok(())
    }

    /// Net movement for (address, denom): `(amount, true)` for a net credit,
    /// `(amount, false)` for a net debit.
    pub fn net(&self, address: Address, denom: &str) -> (Amount, bool) {
        match self.entries.get(&(address, denom.to_string())) {
            Some(entry) if entry.credit >= entry.debit => (entry.credit - entry.debit, true),
            Some(entry) => (entry.debit - entry.credit, false),
            None => (Amount::ZERO, true),
        }
    }

    /// Move the net amounts through the escrow.
    pub fn apply<B: BankKeeper + ?Sized>(self, ctx: &mut Context<'_>, bank: &B) -> Result<()> {
        let mut payouts = Vec::new();
        for ((address, denom), entry) in self.entries {
            if entry.debit > entry.credit {
                let coin = Coin::new(denom, entry.debit - entry.credit);
                trace!(target: "exchange", from = ?address, %coin, "settling debit");
                bank.send_coins(ctx, address, self.escrow, &[coin])?;
            } else if entry.credit > entry.debit {
                payouts.push((address, Coin::new(denom, entry.credit - entry.debit)));
            }
        }
        for (address, coin) in payouts {
            trace!(target: "exchange", to = ?address, %coin, "settling credit");
            bank.send_coins(ctx, self.escrow, address, &[coin])?;
        }
        Ok(())
    }
}
