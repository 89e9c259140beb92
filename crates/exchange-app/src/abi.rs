//! Exchange module ABI: calldata for requests and logs for events.

use crate::types::{
    HandlerError, Msg, MsgCancelOrder, MsgCreateMarket, MsgPlaceLimitOrder, MsgPlaceMarketOrder,
    MsgSwapExactIn,
};
use alloy_primitives::{Address, Log};
use alloy_sol_macro::sol;
use alloy_sol_types::{SolCall, SolEvent};
use exchange::{Coin, Dec, Event};

sol! {
    interface IExchange {
        event MarketCreated(uint64 indexed marketId, address indexed creator, string baseDenom, string quoteDenom, address escrowAddress);
        event MarketFeeRatesUpdated(uint64 indexed marketId, bool useDefaults, string makerFeeRate, string takerFeeRate);
        event OrderPlaced(uint64 indexed marketId, address indexed orderer, uint64 orderId, bool isBuy, string price, uint256 quantity, uint256 executedQuantity, uint256 executedQuote, bool rested, uint64 deadline);
        event MarketOrderPlaced(uint64 indexed marketId, address indexed orderer, bool isBuy, uint256 quantity, uint256 executedQuantity, uint256 executedQuote);
        event OrderFilled(uint64 indexed marketId, uint64 indexed makerOrderId, address indexed taker, uint64 takerOrderId, address maker, bool takerIsBuy, string price, uint256 quantity, uint256 quoteAmount, string feeDenom, uint256 takerFee, uint256 makerFee, uint256 makerRebate);
        event OrderCancelled(uint64 indexed orderId, uint64 indexed marketId, address indexed orderer, uint256 refundedBase, uint256 refundedQuote);
        event OrderExpired(uint64 indexed orderId, uint64 indexed marketId, address indexed orderer, uint256 refundedBase, uint256 refundedQuote);
        event SwapExecuted(address indexed orderer, uint64[] routes, string inputDenom, uint256 inputAmount, string outputDenom, uint256 outputAmount);

        function createMarket(string baseDenom, string quoteDenom) external returns (uint64 marketId);
        function placeLimitOrder(uint64 marketId, bool isBuy, string price, uint256 quantity, uint64 lifespan) external returns (uint64 orderId, uint256 executedQuantity, uint256 executedQuote);
        function placeMarketOrder(uint64 marketId, bool isBuy, uint256 quantity) external returns (uint256 executedQuantity, uint256 executedQuote);
        function cancelOrder(uint64 orderId) external;
        function swapExactIn(uint64[] routes, string inputDenom, uint256 inputAmount, string minOutputDenom, uint256 minOutputAmount) external returns (uint256 output);
    }
}

pub mod selectors {
    use super::IExchange;
    use alloy_sol_types::SolCall;

    pub const CREATE_MARKET: [u8; 4] = IExchange::createMarketCall::SELECTOR;
    pub const PLACE_LIMIT_ORDER: [u8; 4] = IExchange::placeLimitOrderCall::SELECTOR;
    pub const PLACE_MARKET_ORDER: [u8; 4] = IExchange::placeMarketOrderCall::SELECTOR;
    pub const CANCEL_ORDER: [u8; 4] = IExchange::cancelOrderCall::SELECTOR;
    pub const SWAP_EXACT_IN: [u8; 4] = IExchange::swapExactInCall::SELECTOR;
}

fn decode_call<C: SolCall>(calldata: &[u8]) -> Result<C, HandlerError> {
    C::abi_decode(calldata)
        .map_err(|err| HandlerError::InvalidCalldata(format!("failed to decode {}: {err}", C::SIGNATURE)))
}

/// Decode exchange calldata sent by `caller` into a request.
pub fn decode_calldata(caller: Address, calldata: &[u8]) -> Result<Msg, HandlerError> {
    if calldata.len() < 4 {
        return Err(HandlerError::InvalidCalldata(
            "calldata too short for function selector".to_string(),
        ));
    }
    let sender = caller.to_string();
    let selector = &calldata[..4];

    let msg = match selector {
        s if s == selectors::CREATE_MARKET.as_slice() => {
            let call: IExchange::createMarketCall = decode_call(calldata)?;
            Msg::CreateMarket(MsgCreateMarket {
                sender,
                base_denom: call.baseDenom,
                quote_denom: call.quoteDenom,
            })
        }
        s if s == selectors::PLACE_LIMIT_ORDER.as_slice() => {
            let call: IExchange::placeLimitOrderCall = decode_call(calldata)?;
            let price: Dec = call.price.parse().map_err(|err| {
                HandlerError::InvalidCalldata(format!("invalid price {:?}: {err}", call.price))
            })?;
            Msg::PlaceLimitOrder(MsgPlaceLimitOrder {
                sender,
                market_id: call.marketId,
                is_buy: call.isBuy,
                price,
                quantity: call.quantity,
                lifespan: (call.lifespan != 0).then_some(call.lifespan),
            })
        }
        s if s == selectors::PLACE_MARKET_ORDER.as_slice() => {
            let call: IExchange::placeMarketOrderCall = decode_call(calldata)?;
            Msg::PlaceMarketOrder(MsgPlaceMarketOrder {
                sender,
                market_id: call.marketId,
                is_buy: call.isBuy,
                quantity: call.quantity,
            })
        }
        s if s == selectors::CANCEL_ORDER.as_slice() => {
            let call: IExchange::cancelOrderCall = decode_call(calldata)?;
            Msg::CancelOrder(MsgCancelOrder {
                sender,
                order_id: call.orderId,
            })
        }
        s if s == selectors::SWAP_EXACT_IN.as_slice() => {
            let call: IExchange::swapExactInCall = decode_call(calldata)?;
            Msg::SwapExactIn(MsgSwapExactIn {
                sender,
                routes: call.routes,
                input: Coin::new(call.inputDenom, call.inputAmount),
                min_output: Coin::new(call.minOutputDenom, call.minOutputAmount),
            })
        }
        _ => {
            return Err(HandlerError::InvalidCalldata(format!(
                "unknown function selector: 0x{}",
                hex::encode(selector)
            )))
        }
    };
    Ok(msg)
}

/// Build the log emitted by `address` for a core event.
pub fn event_log(address: Address, event: &Event) -> Log {
    let data = match event {
        Event::MarketCreated {
            market_id,
            base_denom,
            quote_denom,
            creator,
            escrow_address,
        } => IExchange::MarketCreated {
            marketId: *market_id,
            creator: *creator,
            baseDenom: base_denom.clone(),
            quoteDenom: quote_denom.clone(),
            escrowAddress: *escrow_address,
        }
        .encode_log_data(),
        Event::MarketFeeRatesUpdated {
            market_id,
            fee_rates,
        } => IExchange::MarketFeeRatesUpdated {
            marketId: *market_id,
            useDefaults: fee_rates.is_none(),
            makerFeeRate: fee_rates.map(|r| r.maker.to_string()).unwrap_or_default(),
            takerFeeRate: fee_rates.map(|r| r.taker.to_string()).unwrap_or_default(),
        }
        .encode_log_data(),
        Event::OrderPlaced {
            order_id,
            market_id,
            orderer,
            side,
            price,
            quantity,
            executed_quantity,
            executed_quote,
            rested,
            deadline,
        } => IExchange::OrderPlaced {
            marketId: *market_id,
            orderer: *orderer,
            orderId: order_id.unwrap_or_default(),
            isBuy: side.is_buy(),
            price: price.to_string(),
            quantity: *quantity,
            executedQuantity: *executed_quantity,
            executedQuote: *executed_quote,
            rested: *rested,
            deadline: deadline.unwrap_or_default(),
        }
        .encode_log_data(),
        Event::MarketOrderPlaced {
            market_id,
            orderer,
            side,
            quantity,
            executed_quantity,
            executed_quote,
        } => IExchange::MarketOrderPlaced {
            marketId: *market_id,
            orderer: *orderer,
            isBuy: side.is_buy(),
            quantity: *quantity,
            executedQuantity: *executed_quantity,
            executedQuote: *executed_quote,
        }
        .encode_log_data(),
        Event::OrderFilled {
            market_id,
            taker_order_id,
            maker_order_id,
            taker,
            maker,
            taker_side,
            price,
            quantity,
            quote_amount,
            taker_fee,
            maker_fee,
            maker_rebate,
        } => IExchange::OrderFilled {
            marketId: *market_id,
            makerOrderId: *maker_order_id,
            taker: *taker,
            takerOrderId: taker_order_id.unwrap_or_default(),
            maker: *maker,
            takerIsBuy: taker_side.is_buy(),
            price: price.to_string(),
            quantity: *quantity,
            quoteAmount: *quote_amount,
            feeDenom: taker_fee.denom.clone(),
            takerFee: taker_fee.amount,
            makerFee: maker_fee.amount,
            makerRebate: maker_rebate.amount,
        }
        .encode_log_data(),
        Event::OrderCancelled {
            order_id,
            market_id,
            orderer,
            refunded_base,
            refunded_quote,
        } => IExchange::OrderCancelled {
            orderId: *order_id,
            marketId: *market_id,
            orderer: *orderer,
            refundedBase: *refunded_base,
            refundedQuote: *refunded_quote,
        }
        .encode_log_data(),
        Event::OrderExpired {
            order_id,
            market_id,
            orderer,
            refunded_base,
            refunded_quote,
        } => IExchange::OrderExpired {
            orderId: *order_id,
            marketId: *market_id,
            orderer: *orderer,
            refundedBase: *refunded_base,
            refundedQuote: *refunded_quote,
        }
        .encode_log_data(),
        Event::SwapExecuted {
            orderer,
            routes,
            input,
            output,
        } => IExchange::SwapExecuted {
            orderer: *orderer,
            routes: routes.clone(),
            inputDenom: input.denom.clone(),
            inputAmount: input.amount,
            outputDenom: output.denom.clone(),
            outputAmount: output.amount,
        }
        .encode_log_data(),
    };
    Log { address, data }
}
