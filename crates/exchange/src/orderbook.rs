//! Store-backed order book.
//!
//! The book index lives under `0x07 | market | side | price | height | id`,
//! so a prefix scan of one side yields orders in price-time priority:
//! - buys: highest price first (the price bytes are inverted)
//! - sells: lowest price first
//!
//! Ties at a price go to the lower `msg_height`, then the lower order id.

use crate::context::Context;
use crate::dec::Dec;
use crate::error::Result;
use crate::keys;
use crate::order::{get_order, set_order, Order};
use crate::types::OrderSide;
use std::ops::ControlFlow;

/// Whether a taker on `taker_side` with limit `limit` accepts a maker at
/// `maker_price`.
pub fn crosses(taker_side: OrderSide, limit: Dec, maker_price: Dec) -> bool {
    match taker_side {
        OrderSide::Buy => limit >= maker_price,
        OrderSide::Sell => limit <= maker_price,
    }
}

/// Resume point within one side of a book.
///
/// Seeking from the cursor skips everything before it, including entries
/// deleted earlier in the same overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BookCursor {
    prefix: Vec<u8>,
    start: Vec<u8>,
}

/// The order book of one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBook {
    market_id: u64,
}

impl OrderBook {
    pub fn new(market_id: u64) -> Self {
        Self { market_id }
    }

    pub fn market_id(&self) -> u64 {
        self.market_id
    }

    fn book_key(&self, order: &Order) -> Vec<u8> {
        keys::order_book_key(
            self.market_id,
            order.side,
            order.price,
            order.msg_height,
            order.id,
        )
    }

    /// Store `order` and index it. The caller must already have moved its
    /// deposit into the market escrow.
    pub fn insert_order(&self, ctx: &mut Context<'_>, order: &Order) -> Result<()> {
        debug_assert_eq!(order.market_id, self.market_id);
        set_order(ctx, order)?;
        ctx.set(self.book_key(order), Vec::new())?;
        ctx.set(
            keys::orders_by_orderer_key(order.orderer, self.market_id, order.id),
            Vec::new(),
        )?;
        if let Some(deadline) = order.deadline {
            ctx.set(keys::orders_by_deadline_key(deadline, order.id), Vec::new())?;
        }
        Ok(())
    }

    /// Persist changes to an order already in the book. Price, height and id
    /// must be unchanged.
    pub fn update_order(&self, ctx: &mut Context<'_>, order: &Order) -> Result<()> {
        set_order(ctx, order)
    }

    /// Delete `order` and all of its index entries. Refunding its remaining
    /// deposit is up to the caller.
    pub fn remove_order(&self, ctx: &mut Context<'_>, order: &Order) -> Result<()> {
        ctx.delete(&keys::order_key(order.id))?;
        ctx.delete(&self.book_key(order))?;
        ctx.delete(&keys::orders_by_orderer_key(
            order.orderer,
            self.market_id,
            order.id,
        ))?;
        if let Some(deadline) = order.deadline {
            ctx.delete(&keys::orders_by_deadline_key(deadline, order.id))?;
        }
        Ok(())
    }

    /// Load the order an index key points to.
    ///
    /// Panics on a dangling index entry.
    fn order_at(&self, ctx: &mut Context<'_>, key: &[u8]) -> Result<Order> {
        let Some(order_id) = keys::parse_order_book_key(key) else {
            panic!("malformed order book key: 0x{}", hex::encode(key));
        };
        match get_order(ctx, order_id)? {
            Some(order) => Ok(order),
            None => panic!("order {order_id} indexed in book of market {} but missing", self.market_id),
        }
    }

    /// Visit orders resting on `side` in priority order until the visitor
    /// breaks or the side is exhausted.
    pub fn walk_side<F>(&self, ctx: &mut Context<'_>, side: OrderSide, mut visit: F) -> Result<()>
    where
        F: FnMut(&Order) -> ControlFlow<()>,
    {
        let prefix = keys::order_book_side_prefix(self.market_id, side);
        let mut cursor = ctx.first_in_prefix(&prefix)?;
        while let Some((key, _)) = cursor {
            let order = self.order_at(ctx, &key)?;
            if visit(&order).is_break() {
                break;
            }
            cursor = ctx.next_in_prefix(&prefix, &key)?;
        }
        Ok(())
    }

    /// Visit the side opposite `taker_side` in priority order while `accepts`
    /// holds for the resting price.
    ///
    /// The visitor may fill, update or remove the order it is given. The walk
    /// then resumes at that order's key, so an order left in the book is
    /// visited again and orders removed along the way are never rescanned.
    pub fn walk<P, F>(
        &self,
        ctx: &mut Context<'_>,
        taker_side: OrderSide,
        accepts: P,
        mut visit: F,
    ) -> Result<()>
    where
        P: Fn(Dec) -> bool,
        F: FnMut(&mut Context<'_>, Order) -> Result<ControlFlow<()>>,
    {
        let mut cursor = self.cursor(taker_side.opposite());
        while let Some((key, order)) = self.peek(ctx, &cursor)? {
            if !accepts(order.price) {
                break;
            }
            if visit(ctx, order)?.is_break() {
                break;
            }
            cursor.start = key;
        }
        Ok(())
    }

    /// A cursor at the best order on `side`.
    fn cursor(&self, side: OrderSide) -> BookCursor {
        let prefix = keys::order_book_side_prefix(self.market_id, side);
        BookCursor {
            start: prefix.clone(),
            prefix,
        }
    }

    /// The order at or after `cursor`, with its book key.
    fn peek(
        &self,
        ctx: &mut Context<'_>,
        cursor: &BookCursor,
    ) -> Result<Option<(Vec<u8>, Order)>> {
        match ctx.seek_in_prefix(&cursor.prefix, &cursor.start)? {
            Some((key, _)) => {
                let order = self.order_at(ctx, &key)?;
                Ok(Some((key, order)))
            }
            None => Ok(None),
        }
    }

    /// All orders on `side`, in priority order.
    pub fn orders(&self, ctx: &mut Context<'_>, side: OrderSide) -> Result<Vec<Order>> {
        let mut orders = Vec::new();
        self.walk_side(ctx, side, |order| {
            orders.push(order.clone());
            ControlFlow::Continue(())
        })?;
        Ok(orders)
    }
}
