//! ABI encoding of persisted records.
//!
//! Records are `sol!` structs encoded with [`SolValue`]. Stored bytes are
//! written only by this crate, so a record that fails to decode means the
//! state is corrupt and decoding panics.

use crate::dec::Dec;
use crate::market::{Market, MarketState};
use crate::order::Order;
use crate::params::{FeeRates, Params};
use crate::types::{Amount, Coin, Coins, OrderSide, U256};
use alloy::sol;
use alloy::sol_types::SolValue;

sol! {
    struct DecRecord {
        bool negative;
        uint256 raw;
    }

    struct CoinRecord {
        string denom;
        uint256 amount;
    }

    struct MarketRecord {
        uint64 id;
        string baseDenom;
        string quoteDenom;
        address escrowAddress;
        bool hasFeeRates;
        DecRecord makerFeeRate;
        DecRecord takerFeeRate;
    }

    struct MarketStateRecord {
        bool hasLastPrice;
        DecRecord lastPrice;
    }

    struct OrderRecord {
        uint64 id;
        uint64 marketId;
        address orderer;
        bool isBuy;
        DecRecord price;
        uint256 quantity;
        uint256 openQuantity;
        uint64 msgHeight;
        uint256 deposit;
        uint256 remainingDeposit;
        uint64 deadline;
    }

    struct ParamsRecord {
        CoinRecord[] marketCreationFee;
        DecRecord defaultMakerFeeRate;
        DecRecord defaultTakerFeeRate;
    }
}

fn decode<T>(what: &str, data: &[u8]) -> T
where
    T: SolValue + From<<T::SolType as alloy::sol_types::SolType>::RustType>,
{
    match <T as SolValue>::abi_decode(data) {
        Ok(record) => record,
        Err(err) => panic!("corrupt {what} record: {err}"),
    }
}

impl From<Dec> for DecRecord {
    fn from(dec: Dec) -> Self {
        Self {
            negative: dec.is_negative(),
            raw: dec.raw(),
        }
    }
}

impl From<DecRecord> for Dec {
    fn from(record: DecRecord) -> Self {
        Dec::from_raw_parts(record.negative, record.raw)
    }
}

fn optional_dec(present: bool, record: DecRecord) -> Option<Dec> {
    present.then(|| record.into())
}

pub fn encode_market(market: &Market) -> Vec<u8> {
    let rates = market.fee_rates.unwrap_or(FeeRates::new(Dec::ZERO, Dec::ZERO));
    MarketRecord {
        id: market.id,
        baseDenom: market.base_denom.clone(),
        quoteDenom: market.quote_denom.clone(),
        escrowAddress: market.escrow_address,
        hasFeeRates: market.fee_rates.is_some(),
        makerFeeRate: rates.maker.into(),
        takerFeeRate: rates.taker.into(),
    }
    .abi_encode()
}

pub fn decode_market(data: &[u8]) -> Market {
    let record: MarketRecord = decode("market", data);
    let fee_rates = if record.hasFeeRates {
        Some(FeeRates::new(
            record.makerFeeRate.into(),
            record.takerFeeRate.into(),
        ))
    } else {
        None
    };
    Market {
        id: record.id,
        base_denom: record.baseDenom,
        quote_denom: record.quoteDenom,
        escrow_address: record.escrowAddress,
        fee_rates,
    }
}

pub fn encode_market_state(state: &MarketState) -> Vec<u8> {
    MarketStateRecord {
        hasLastPrice: state.last_price.is_some(),
        lastPrice: state.last_price.unwrap_or(Dec::ZERO).into(),
    }
    .abi_encode()
}

pub fn decode_market_state(data: &[u8]) -> MarketState {
    let record: MarketStateRecord = decode("market state", data);
    MarketState {
        last_price: optional_dec(record.hasLastPrice, record.lastPrice),
    }
}

pub fn encode_order(order: &Order) -> Vec<u8> {
    OrderRecord {
        id: order.id,
        marketId: order.market_id,
        orderer: order.orderer,
        isBuy: order.side.is_buy(),
        price: order.price.into(),
        quantity: order.quantity,
        openQuantity: order.open_quantity,
        msgHeight: order.msg_height,
        deposit: order.deposit,
        remainingDeposit: order.remaining_deposit,
        deadline: order.deadline.unwrap_or(0),
    }
    .abi_encode()
}

pub fn decode_order(data: &[u8]) -> Order {
    let record: OrderRecord = decode("order", data);
    Order {
        id: record.id,
        market_id: record.marketId,
        orderer: record.orderer,
        side: OrderSide::from_is_buy(record.isBuy),
        price: record.price.into(),
        quantity: record.quantity,
        open_quantity: record.openQuantity,
        msg_height: record.msgHeight,
        deposit: record.deposit,
        remaining_deposit: record.remainingDeposit,
        deadline: (record.deadline != 0).then_some(record.deadline),
    }
}

pub fn encode_params(params: &Params) -> Vec<u8> {
    ParamsRecord {
        marketCreationFee: params
            .market_creation_fee
            .iter()
            .map(|coin| CoinRecord {
                denom: coin.denom.clone(),
                amount: coin.amount,
            })
            .collect(),
        defaultMakerFeeRate: params.default_maker_fee_rate.into(),
        defaultTakerFeeRate: params.default_taker_fee_rate.into(),
    }
    .abi_encode()
}

pub fn decode_params(data: &[u8]) -> Params {
    let record: ParamsRecord = decode("params", data);
    let coins = record
        .marketCreationFee
        .into_iter()
        .map(|coin| Coin::new(coin.denom, coin.amount))
        .collect();
    let market_creation_fee = match Coins::new(coins) {
        Ok(coins) => coins,
        Err(err) => panic!("corrupt params record: {err}"),
    };
    Params {
        market_creation_fee,
        default_maker_fee_rate: record.defaultMakerFeeRate.into(),
        default_taker_fee_rate: record.defaultTakerFeeRate.into(),
    }
}

pub fn encode_amount(amount: Amount) -> Vec<u8> {
    amount.to_be_bytes::<32>().to_vec()
}

pub fn decode_amount(data: &[u8]) -> Amount {
    match U256::try_from_be_slice(data) {
        Some(amount) if data.len() == 32 => amount,
        _ => panic!("corrupt amount record: {} bytes", data.len()),
    }
}
