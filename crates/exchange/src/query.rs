//! Read-only queries.

use crate::bank::BankKeeper;
use crate::context::Context;
use crate::dec::Dec;
use crate::error::{ExchangeError, Result};
use crate::exchange::Exchange;
use crate::keys;
use crate::market::{must_get_market, must_get_market_state, Market};
use crate::order::{must_get_order, Order};
use crate::orderbook::OrderBook;
use crate::params::{FeeRates, Params};
use crate::types::{Address, Amount, OrderSide};
use std::ops::ControlFlow;

/// Page size used when a request leaves `limit` at zero.
pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// Cursor or offset based paging.
///
/// `key` and `offset` are mutually exclusive. A `limit` of zero means
/// [`DEFAULT_PAGE_LIMIT`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Resume from this key, as returned in [`PageResponse::next_key`].
    pub key: Option<Vec<u8>>,
    pub offset: u64,
    pub limit: u64,
    /// Count all entries. Only honoured for offset paging.
    pub count_total: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResponse {
    /// Key of the first entry of the next page, if there is one.
    pub next_key: Option<Vec<u8>>,
    pub total: Option<u64>,
}

/// A market with its state and effective fee rates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketResponse {
    pub market: Market,
    pub last_price: Option<Dec>,
    pub fee_rates: FeeRates,
}

/// Open quantity aggregated at one price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Dec,
    pub quantity: Amount,
    pub order_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookResponse {
    pub market_id: u64,
    /// Best (highest) price first.
    pub buys: Vec<PriceLevel>,
    /// Best (lowest) price first.
    pub sells: Vec<PriceLevel>,
}

impl<B: BankKeeper> Exchange<B> {
    pub fn query_params(&self, ctx: &mut Context<'_>) -> Result<Params> {
        self.get_params(ctx)
    }

    fn market_response(&self, ctx: &mut Context<'_>, market: Market) -> Result<MarketResponse> {
        let state = must_get_market_state(ctx, market.id)?;
        let fee_rates = self.fee_rates(ctx, &market)?;
        Ok(MarketResponse {
            market,
            last_price: state.last_price,
            fee_rates,
        })
    }

    pub fn query_market(&self, ctx: &mut Context<'_>, market_id: u64) -> Result<MarketResponse> {
        let market = must_get_market(ctx, market_id)?;
        self.market_response(ctx, market)
    }

    /// All markets in id order.
    pub fn query_markets(
        &self,
        ctx: &mut Context<'_>,
        page: &PageRequest,
    ) -> Result<(Vec<MarketResponse>, PageResponse)> {
        if page.key.is_some() && page.offset > 0 {
            return Err(ExchangeError::InvalidRequest(
                "either offset or key is expected, got both".into(),
            ));
        }
        let limit = if page.limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            page.limit
        };
        let count_total = page.count_total && page.key.is_none();

        let prefix = keys::market_key_prefix();
        let start = match &page.key {
            Some(key) => [prefix.as_slice(), key].concat(),
            None => prefix.clone(),
        };
        let mut market_ids = Vec::new();
        let mut next_key = None;
        let mut index = 0u64;
        ctx.scan_from(&prefix, &start, |key, _| {
            let Some(market_id) = keys::parse_market_key(key) else {
                panic!("malformed market key: 0x{}", hex::encode(key));
            };
            if index >= page.offset {
                if (market_ids.len() as u64) < limit {
                    market_ids.push(market_id);
                } else if next_key.is_none() {
                    next_key = Some(key[prefix.len()..].to_vec());
                    if !count_total {
                        return ControlFlow::Break(());
                    }
                }
            }
            index += 1;
            ControlFlow::Continue(())
        })?;

        let mut markets = Vec::with_capacity(market_ids.len());
        for market_id in market_ids {
            markets.push(self.query_market(ctx, market_id)?);
        }
        let page = PageResponse {
            next_key,
            total: count_total.then_some(index),
        };
        Ok((markets, page))
    }

    pub fn query_order(&self, ctx: &mut Context<'_>, order_id: u64) -> Result<Order> {
        must_get_order(ctx, order_id)
    }

    /// Resting orders of `orderer`, by market then order id.
    pub fn query_orders_by_orderer(
        &self,
        ctx: &mut Context<'_>,
        orderer: Address,
        market_id: Option<u64>,
    ) -> Result<Vec<Order>> {
        let prefix = match market_id {
            Some(market_id) => keys::orders_by_orderer_market_prefix(orderer, market_id),
            None => keys::orders_by_orderer_prefix(orderer),
        };
        let mut order_ids = Vec::new();
        ctx.scan_prefix(&prefix, |key, _| {
            match keys::parse_orders_by_orderer_key(key) {
                Some(order_id) => order_ids.push(order_id),
                None => panic!("malformed orderer index key: 0x{}", hex::encode(key)),
            }
            ControlFlow::Continue(())
        })?;

        let mut orders = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            let Some(order) = crate::order::get_order(ctx, order_id)? else {
                panic!("order {order_id} indexed for {orderer} but missing");
            };
            orders.push(order);
        }
        Ok(orders)
    }

    /// Up to `depth` price levels per side. A depth of zero returns every level.
    pub fn query_order_book(
        &self,
        ctx: &mut Context<'_>,
        market_id: u64,
        depth: usize,
    ) -> Result<OrderBookResponse> {
        must_get_market(ctx, market_id)?;
        let book = OrderBook::new(market_id);
        Ok(OrderBookResponse {
            market_id,
            buys: price_levels(ctx, &book, OrderSide::Buy, depth)?,
            sells: price_levels(ctx, &book, OrderSide::Sell, depth)?,
        })
    }
}

fn price_levels(
    ctx: &mut Context<'_>,
    book: &OrderBook,
    side: OrderSide,
    depth: usize,
) -> Result<Vec<PriceLevel>> {
    let mut levels: Vec<PriceLevel> = Vec::new();
    book.walk_side(ctx, side, |order| {
        match levels.last_mut() {
            Some(level) if level.price == order.price => {
                level.quantity += order.open_quantity;
                level.order_count += 1;
            }
            _ => {
                if depth > 0 && levels.len() == depth {
                    return ControlFlow::Break(());
                }
                levels.push(PriceLevel {
                    price: order.price,
                    quantity: order.open_quantity,
                    order_count: 1,
                });
            }
        }
        ControlFlow::Continue(())
    })?;
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::StoreBank;
    use crate::context::BlockHeader;
    use crate::error::ErrorKind;
    use crate::store::MemStore;
    use crate::types::{Coin, U256};

    const ALICE: Address = Address::repeat_byte(0xa1);

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    fn setup(ctx: &mut Context<'_>, denoms: &[&str]) -> Exchange {
        let exchange = Exchange::new(StoreBank::new());
        for denom in denoms {
            exchange
                .bank()
                .mint_coins(ctx, ALICE, &[Coin::from_u128(*denom, 1_000_000)])
                .unwrap();
        }
        exchange
    }

    #[test]
    fn test_markets_pagination() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(1, 0));
        let exchange = setup(&mut ctx, &["a", "b", "c", "d"]);
        for (base, quote) in [("a", "b"), ("a", "c"), ("a", "d"), ("b", "c"), ("b", "d")] {
            exchange.create_market(&mut ctx, ALICE, base, quote).unwrap();
        }

        let (markets, page) = exchange
            .query_markets(
                &mut ctx,
                &PageRequest {
                    limit: 2,
                    count_total: true,
                    ..Default::default()
                },
            )
            .unwrap();
        let ids: Vec<u64> = markets.iter().map(|m| m.market.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(page.total, Some(5));
        assert_eq!(page.next_key, Some(keys::encode_u64(3)));

        let (markets, page) = exchange
            .query_markets(
                &mut ctx,
                &PageRequest {
                    key: page.next_key,
                    limit: 10,
                    ..Default::default()
                },
            )
            .unwrap();
        let ids: Vec<u64> = markets.iter().map(|m| m.market.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(page, PageResponse::default());

        let (markets, _) = exchange
            .query_markets(
                &mut ctx,
                &PageRequest {
                    offset: 4,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(markets.len(), 1);

        let err = exchange
            .query_markets(
                &mut ctx,
                &PageRequest {
                    key: Some(keys::encode_u64(1)),
                    offset: 1,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_order_book_levels() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(1, 0));
        let exchange = setup(&mut ctx, &["uatom", "uusd"]);
        exchange.create_market(&mut ctx, ALICE, "uatom", "uusd").unwrap();
        for (side, price, qty) in [
            (OrderSide::Buy, "1", 10u64),
            (OrderSide::Buy, "1.1", 5),
            (OrderSide::Buy, "1", 7),
            (OrderSide::Buy, "0.9", 1),
            (OrderSide::Sell, "2", 3),
            (OrderSide::Sell, "1.5", 4),
        ] {
            exchange
                .place_limit_order(&mut ctx, 1, ALICE, side, dec(price), U256::from(qty), None)
                .unwrap();
        }

        let book = exchange.query_order_book(&mut ctx, 1, 2).unwrap();
        assert_eq!(
            book.buys,
            vec![
                PriceLevel {
                    price: dec("1.1"),
                    quantity: U256::from(5u64),
                    order_count: 1
                },
                PriceLevel {
                    price: dec("1"),
                    quantity: U256::from(17u64),
                    order_count: 2
                },
            ]
        );
        let sell_prices: Vec<Dec> = book.sells.iter().map(|l| l.price).collect();
        assert_eq!(sell_prices, vec![dec("1.5"), dec("2")]);

        assert_eq!(exchange.query_order_book(&mut ctx, 1, 0).unwrap().buys.len(), 3);
        assert_eq!(
            exchange.query_order_book(&mut ctx, 9, 0).unwrap_err(),
            ExchangeError::MarketNotFound(9)
        );
    }

    #[test]
    fn test_orders_by_orderer() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(1, 0));
        let exchange = setup(&mut ctx, &["uatom", "uusd", "stake"]);
        exchange.create_market(&mut ctx, ALICE, "uatom", "uusd").unwrap();
        exchange.create_market(&mut ctx, ALICE, "stake", "uusd").unwrap();
        for market_id in [2, 1, 2] {
            exchange
                .place_limit_order(&mut ctx, market_id, ALICE, OrderSide::Sell, dec("3"), U256::from(1u64), None)
                .unwrap();
        }

        let ids = |orders: Vec<Order>| orders.iter().map(|o| o.id).collect::<Vec<_>>();
        assert_eq!(
            ids(exchange.query_orders_by_orderer(&mut ctx, ALICE, None).unwrap()),
            vec![2, 1, 3]
        );
        assert_eq!(
            ids(exchange.query_orders_by_orderer(&mut ctx, ALICE, Some(2)).unwrap()),
            vec![1, 3]
        );
        assert!(exchange
            .query_orders_by_orderer(&mut ctx, Address::ZERO, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_market_response() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(1, 0));
        let exchange = setup(&mut ctx, &["uatom", "uusd"]);
        exchange.create_market(&mut ctx, ALICE, "uatom", "uusd").unwrap();

        let response = exchange.query_market(&mut ctx, 1).unwrap();
        assert_eq!(response.last_price, None);
        assert_eq!(response.fee_rates, Params::default().default_fee_rates());
        assert_eq!(
            exchange.query_order(&mut ctx, 1).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
