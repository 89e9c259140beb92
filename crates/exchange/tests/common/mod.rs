//! Shared helpers for the exchange integration tests.

#![allow(dead_code)]

use exchange::{
    Address, Amount, BankKeeper, BlockHeader, Coin, Context, Dec, Event, Exchange, LimitOrderResult,
    Market, MarketOrderResult, MemStore, OrderSide, StoreBank, U256,
};

pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const BLOCK_TIME: u64 = 6;

// Trader addresses
pub fn alice() -> Address {
    Address::repeat_byte(0xAA)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xBB)
}

pub fn carol() -> Address {
    Address::repeat_byte(0xCC)
}

pub fn david() -> Address {
    Address::repeat_byte(0xDD)
}

pub fn dec(s: &str) -> Dec {
    s.parse().unwrap()
}

pub fn amount(n: u64) -> Amount {
    U256::from(n)
}

pub fn coin(denom: &str, n: u64) -> Coin {
    Coin::new(denom, amount(n))
}

/// A single-node chain: a store, the exchange and a block clock.
pub struct TestChain {
    pub store: MemStore,
    pub exchange: Exchange,
    pub height: u64,
    pub time: u64,
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TestChain {
    pub fn new() -> Self {
        Self {
            store: MemStore::new(),
            exchange: Exchange::new(StoreBank::new()),
            height: 1,
            time: GENESIS_TIME,
        }
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader::new(self.height, self.time)
    }

    /// Run `f` against a fresh context for the current block.
    pub fn exec<T>(&mut self, f: impl FnOnce(&Exchange, &mut Context<'_>) -> T) -> T {
        self.exec_with_events(f).0
    }

    /// Like [`TestChain::exec`], also returning the emitted events.
    pub fn exec_with_events<T>(
        &mut self,
        f: impl FnOnce(&Exchange, &mut Context<'_>) -> T,
    ) -> (T, Vec<Event>) {
        let header = self.header();
        let mut ctx = Context::new(&mut self.store, header);
        let result = f(&self.exchange, &mut ctx);
        (result, ctx.take_events())
    }

    /// Close the block (running expiry) and start the next one.
    pub fn next_block(&mut self) -> Vec<u64> {
        let expired = self
            .exec(|ex, ctx| ex.cancel_expired_orders(ctx))
            .unwrap();
        self.height += 1;
        self.time += BLOCK_TIME;
        expired
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.time += secs;
    }

    pub fn fund(&mut self, who: Address, coins: &[Coin]) {
        self.exec(|ex, ctx| ex.bank().mint_coins(ctx, who, coins))
            .unwrap();
    }

    pub fn balance(&mut self, who: Address, denom: &str) -> Amount {
        self.exec(|ex, ctx| ex.bank().balance(ctx, who, denom))
            .unwrap()
    }

    pub fn fee_collector_balance(&mut self, denom: &str) -> Amount {
        let collector = self.exchange.fee_collector();
        self.balance(collector, denom)
    }

    pub fn create_market(&mut self, base: &str, quote: &str) -> Market {
        // Both denoms need a supply.
        let creator = Address::repeat_byte(0xEE);
        self.fund(creator, &[coin(base, 1), coin(quote, 1)]);
        self.exec(|ex, ctx| ex.create_market(ctx, creator, base, quote))
            .unwrap()
    }

    pub fn place_limit_order(
        &mut self,
        market_id: u64,
        who: Address,
        side: OrderSide,
        price: &str,
        quantity: u64,
    ) -> LimitOrderResult {
        let price = dec(price);
        self.exec(|ex, ctx| {
            ex.place_limit_order(ctx, market_id, who, side, price, amount(quantity), None)
        })
        .unwrap()
    }

    pub fn place_market_order(
        &mut self,
        market_id: u64,
        who: Address,
        side: OrderSide,
        quantity: u64,
    ) -> MarketOrderResult {
        self.exec(|ex, ctx| ex.place_market_order(ctx, market_id, who, side, amount(quantity)))
            .unwrap()
    }

    /// Sum of the remaining deposits of every resting order of `market`.
    pub fn resting_deposits(&mut self, market: &Market) -> (Amount, Amount) {
        let book = exchange::OrderBook::new(market.id);
        let (buys, sells) = self.exec(|_, ctx| {
            (
                book.orders(ctx, OrderSide::Buy).unwrap(),
                book.orders(ctx, OrderSide::Sell).unwrap(),
            )
        });
        let total = |orders: &[exchange::Order]| {
            orders
                .iter()
                .fold(Amount::ZERO, |acc, order| acc + order.remaining_deposit)
        };
        (total(&sells), total(&buys))
    }

    /// Assert the escrow of `market` holds exactly the deposits of its
    /// resting orders.
    pub fn assert_escrow_balanced(&mut self, market: &Market) {
        let (base, quote) = self.resting_deposits(market);
        assert_eq!(self.balance(market.escrow_address, &market.base_denom), base);
        assert_eq!(self.balance(market.escrow_address, &market.quote_denom), quote);
    }
}
