//! Store key layout.
//!
//! Every key starts with a one-byte namespace prefix. Integers are encoded
//! big-endian so lexicographic key order matches numeric order.

use crate::dec::Dec;
use crate::types::{Address, OrderSide};

pub const LAST_MARKET_ID_KEY: &[u8] = &[0x01];
pub const LAST_ORDER_ID_KEY: &[u8] = &[0x02];
pub const MARKET_KEY_PREFIX: u8 = 0x03;
pub const MARKET_STATE_KEY_PREFIX: u8 = 0x04;
pub const MARKET_BY_PAIR_KEY_PREFIX: u8 = 0x05;
pub const ORDER_KEY_PREFIX: u8 = 0x06;
pub const ORDER_BOOK_KEY_PREFIX: u8 = 0x07;
pub const PARAMS_KEY: &[u8] = &[0x08];
pub const ORDERS_BY_ORDERER_KEY_PREFIX: u8 = 0x09;
pub const ORDERS_BY_DEADLINE_KEY_PREFIX: u8 = 0x0a;

const BUY_SIDE: u8 = 0x01;
const SELL_SIDE: u8 = 0x02;

fn side_byte(side: OrderSide) -> u8 {
    match side {
        OrderSide::Buy => BUY_SIDE,
        OrderSide::Sell => SELL_SIDE,
    }
}

fn prefixed_u64(prefix: u8, id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Read a big-endian `u64` at `offset`.
fn read_u64(key: &[u8], offset: usize) -> Option<u64> {
    let bytes: [u8; 8] = key.get(offset..offset + 8)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn decode_u64(bytes: &[u8]) -> Option<u64> {
    read_u64(bytes, 0).filter(|_| bytes.len() == 8)
}

pub fn market_key_prefix() -> Vec<u8> {
    vec![MARKET_KEY_PREFIX]
}

pub fn market_key(market_id: u64) -> Vec<u8> {
    prefixed_u64(MARKET_KEY_PREFIX, market_id)
}

/// Market id encoded in a market key.
pub fn parse_market_key(key: &[u8]) -> Option<u64> {
    match key.first() {
        Some(&MARKET_KEY_PREFIX) if key.len() == 9 => read_u64(key, 1),
        _ => None,
    }
}

pub fn market_state_key(market_id: u64) -> Vec<u8> {
    prefixed_u64(MARKET_STATE_KEY_PREFIX, market_id)
}

/// `0x05 | len(base) | base | quote`. The length byte keeps `("ab", "cd")`
/// and `("abc", "d")` apart; denoms are at most 128 bytes.
pub fn market_by_pair_key(base_denom: &str, quote_denom: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + base_denom.len() + quote_denom.len());
    key.push(MARKET_BY_PAIR_KEY_PREFIX);
    key.push(base_denom.len() as u8);
    key.extend_from_slice(base_denom.as_bytes());
    key.extend_from_slice(quote_denom.as_bytes());
    key
}

pub fn order_key(order_id: u64) -> Vec<u8> {
    prefixed_u64(ORDER_KEY_PREFIX, order_id)
}

/// Big-endian price magnitude, bit-inverted for buys so that higher buy
/// prices sort first.
pub fn price_key(side: OrderSide, price: Dec) -> [u8; 32] {
    let mut bytes = price.raw().to_be_bytes::<32>();
    if side.is_buy() {
        for byte in bytes.iter_mut() {
            *byte = !*byte;
        }
    }
    bytes
}

/// `0x07 | market_id`.
pub fn order_book_market_prefix(market_id: u64) -> Vec<u8> {
    prefixed_u64(ORDER_BOOK_KEY_PREFIX, market_id)
}

/// `0x07 | market_id | side`.
pub fn order_book_side_prefix(market_id: u64, side: OrderSide) -> Vec<u8> {
    let mut key = order_book_market_prefix(market_id);
    key.push(side_byte(side));
    key
}

/// `0x07 | market_id | side | price_key | msg_height | order_id`.
pub fn order_book_key(
    market_id: u64,
    side: OrderSide,
    price: Dec,
    msg_height: u64,
    order_id: u64,
) -> Vec<u8> {
    let mut key = order_book_side_prefix(market_id, side);
    key.extend_from_slice(&price_key(side, price));
    key.extend_from_slice(&msg_height.to_be_bytes());
    key.extend_from_slice(&order_id.to_be_bytes());
    key
}

const ORDER_BOOK_KEY_LEN: usize = 1 + 8 + 1 + 32 + 8 + 8;

/// Order id encoded in an order book key.
pub fn parse_order_book_key(key: &[u8]) -> Option<u64> {
    if key.len() != ORDER_BOOK_KEY_LEN || key[0] != ORDER_BOOK_KEY_PREFIX {
        return None;
    }
    read_u64(key, ORDER_BOOK_KEY_LEN - 8)
}

/// `0x09 | orderer`.
pub fn orders_by_orderer_prefix(orderer: Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(37);
    key.push(ORDERS_BY_ORDERER_KEY_PREFIX);
    key.extend_from_slice(orderer.as_slice());
    key
}

/// `0x09 | orderer | market_id`.
pub fn orders_by_orderer_market_prefix(orderer: Address, market_id: u64) -> Vec<u8> {
    let mut key = orders_by_orderer_prefix(orderer);
    key.extend_from_slice(&market_id.to_be_bytes());
    key
}

/// `0x09 | orderer | market_id | order_id`.
pub fn orders_by_orderer_key(orderer: Address, market_id: u64, order_id: u64) -> Vec<u8> {
    let mut key = orders_by_orderer_market_prefix(orderer, market_id);
    key.extend_from_slice(&order_id.to_be_bytes());
    key
}

pub fn parse_orders_by_orderer_key(key: &[u8]) -> Option<u64> {
    if key.len() != 37 || key[0] != ORDERS_BY_ORDERER_KEY_PREFIX {
        return None;
    }
    read_u64(key, 29)
}

pub fn orders_by_deadline_prefix() -> Vec<u8> {
    vec![ORDERS_BY_DEADLINE_KEY_PREFIX]
}

/// `0x0a | deadline | order_id`.
pub fn orders_by_deadline_key(deadline: u64, order_id: u64) -> Vec<u8> {
    let mut key = prefixed_u64(ORDERS_BY_DEADLINE_KEY_PREFIX, deadline);
    key.extend_from_slice(&order_id.to_be_bytes());
    key
}

/// `(deadline, order_id)` encoded in a deadline index key.
pub fn parse_orders_by_deadline_key(key: &[u8]) -> Option<(u64, u64)> {
    if key.len() != 17 || key[0] != ORDERS_BY_DEADLINE_KEY_PREFIX {
        return None;
    }
    Some((read_u64(key, 1)?, read_u64(key, 9)?))
}
