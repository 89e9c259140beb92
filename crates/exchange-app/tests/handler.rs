//! Dispatcher tests: typed messages, calldata, queries and block hooks.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolEvent};
use exchange::{BlockHeader, Coin, ErrorKind, FeeRates, OrderSide, PageRequest};
use exchange_app::{
    ExchangeHandler, HandlerError, IExchange, Msg, MsgCancelOrder, MsgCreateMarket,
    MsgPlaceLimitOrder, MsgPlaceMarketOrder, MsgResponse, MsgSetMarketFeeRates, MsgSwapExactIn,
    Query, QueryResponse, EXCHANGE_MODULE_ADDRESS,
};

const GENESIS_TIME: u64 = 1_700_000_000;

fn authority() -> Address {
    Address::repeat_byte(0x01)
}

fn alice() -> Address {
    Address::repeat_byte(0xAA)
}

fn bob() -> Address {
    Address::repeat_byte(0xBB)
}

fn header(height: u64) -> BlockHeader {
    BlockHeader::new(height, GENESIS_TIME + height * 6)
}

fn coin(denom: &str, amount: u64) -> Coin {
    Coin::new(denom, U256::from(amount))
}

/// A handler with one uatom/uusd market and funded traders.
fn setup() -> ExchangeHandler {
    let handler = ExchangeHandler::new(authority());
    for who in [alice(), bob()] {
        handler
            .fund_account(who, &[coin("uatom", 1_000), coin("uusd", 1_000)])
            .unwrap();
    }
    let result = handler
        .handle_transaction(
            header(1),
            &Msg::CreateMarket(MsgCreateMarket {
                sender: alice().to_string(),
                base_denom: "uatom".to_string(),
                quote_denom: "uusd".to_string(),
            }),
            None,
        )
        .unwrap();
    assert!(matches!(result.response, MsgResponse::CreateMarket(ref market) if market.id == 1));
    handler
}

fn limit_order(sender: Address, is_buy: bool, price: &str, quantity: u64) -> Msg {
    Msg::PlaceLimitOrder(MsgPlaceLimitOrder {
        sender: sender.to_string(),
        market_id: 1,
        is_buy,
        price: price.parse().unwrap(),
        quantity: U256::from(quantity),
        lifespan: None,
    })
}

#[test]
fn test_create_market_emits_log() {
    let handler = ExchangeHandler::new(authority());
    handler
        .fund_account(alice(), &[coin("uatom", 1), coin("uusd", 1)])
        .unwrap();
    let result = handler
        .handle_transaction(
            header(1),
            &Msg::CreateMarket(MsgCreateMarket {
                sender: alice().to_string(),
                base_denom: "uatom".to_string(),
                quote_denom: "uusd".to_string(),
            }),
            None,
        )
        .unwrap();

    assert_eq!(result.logs.len(), 1);
    let log = &result.logs[0];
    assert_eq!(log.address, EXCHANGE_MODULE_ADDRESS);
    let decoded = IExchange::MarketCreated::decode_log_data(&log.data).unwrap();
    assert_eq!(decoded.marketId, 1);
    assert_eq!(decoded.creator, alice());
    assert_eq!(decoded.baseDenom, "uatom");
    assert!(result.gas_used > 0);
}

#[test]
fn test_limit_orders_match_through_handler() {
    let handler = setup();
    let placed = handler
        .handle_transaction(header(2), &limit_order(alice(), false, "1.5", 40), None)
        .unwrap();
    let MsgResponse::PlaceLimitOrder(result) = placed.response else {
        panic!("unexpected response");
    };
    assert_eq!(result.order_id(), Some(1));

    let filled = handler
        .handle_transaction(header(3), &limit_order(bob(), true, "1.5", 40), None)
        .unwrap();
    let fill_logs: Vec<_> = filled
        .logs
        .iter()
        .filter(|log| log.data.topics()[0] == IExchange::OrderFilled::SIGNATURE_HASH)
        .collect();
    assert_eq!(fill_logs.len(), 1);
    let fill = IExchange::OrderFilled::decode_log_data(&fill_logs[0].data).unwrap();
    assert_eq!(fill.makerOrderId, 1);
    assert_eq!(fill.quantity, U256::from(40u64));
    assert_eq!(fill.quoteAmount, U256::from(60u64));

    // Bob received 40 uatom, paying 60 uusd plus a 1 uusd taker fee.
    assert_eq!(handler.balance(bob(), "uatom").unwrap(), U256::from(1_040u64));
    assert_eq!(handler.balance(bob(), "uusd").unwrap(), U256::from(939u64));
}

#[test]
fn test_failed_transaction_leaves_state_untouched() {
    let handler = setup();
    let root = handler.state_root();

    // Alice cannot escrow 5000 uatom.
    let err = handler
        .handle_transaction(header(2), &limit_order(alice(), false, "1", 5_000), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(handler.state_root(), root);

    let err = handler
        .handle_transaction(
            header(2),
            &Msg::PlaceMarketOrder(MsgPlaceMarketOrder {
                sender: bob().to_string(),
                market_id: 7,
                is_buy: true,
                quantity: U256::from(1u64),
            }),
            None,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(handler.state_root(), root);
}

#[test]
fn test_out_of_gas_rolls_back() {
    let handler = setup();
    let root = handler.state_root();
    let err = handler
        .handle_transaction(header(2), &limit_order(alice(), false, "1.5", 40), Some(10))
        .unwrap_err();
    assert!(matches!(
        err,
        HandlerError::Exchange(exchange::ExchangeError::OutOfGas { .. })
    ));
    assert_eq!(handler.state_root(), root);
}

#[test]
fn test_cancel_requires_orderer() {
    let handler = setup();
    handler
        .handle_transaction(header(2), &limit_order(alice(), true, "1", 10), None)
        .unwrap();

    let cancel = |sender: Address| {
        Msg::CancelOrder(MsgCancelOrder {
            sender: sender.to_string(),
            order_id: 1,
        })
    };
    let err = handler
        .handle_transaction(header(3), &cancel(bob()), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let result = handler
        .handle_transaction(header(3), &cancel(alice()), None)
        .unwrap();
    assert!(matches!(result.response, MsgResponse::CancelOrder(ref order) if order.id == 1));
    assert_eq!(handler.balance(alice(), "uusd").unwrap(), U256::from(1_000u64));
}

#[test]
fn test_calldata_dispatch() {
    let handler = setup();
    let calldata: Bytes = IExchange::placeLimitOrderCall {
        marketId: 1,
        isBuy: false,
        price: "2".to_string(),
        quantity: U256::from(10u64),
        lifespan: 60,
    }
    .abi_encode()
    .into();

    let result = handler
        .handle_calldata(header(2), alice(), &calldata, None)
        .unwrap();
    let MsgResponse::PlaceLimitOrder(placed) = result.response else {
        panic!("unexpected response");
    };
    let order = placed.order.unwrap();
    assert_eq!(order.orderer, alice());
    assert_eq!(order.side, OrderSide::Sell);
    assert_eq!(order.deadline, Some(header(2).time + 60));

    let placed_log = IExchange::OrderPlaced::decode_log_data(&result.logs[0].data).unwrap();
    assert_eq!(placed_log.orderId, 1);
    assert!(placed_log.rested);

    let err = handler
        .handle_calldata(header(2), alice(), &Bytes::from_static(&[0xde, 0xad]), None)
        .unwrap_err();
    assert!(matches!(err, HandlerError::InvalidCalldata(_)));
}

#[test]
fn test_authority_messages() {
    let handler = setup();
    let set_rates = |sender: Address| {
        Msg::SetMarketFeeRates(MsgSetMarketFeeRates {
            authority: sender.to_string(),
            market_id: 1,
            fee_rates: Some(FeeRates::new("0".parse().unwrap(), "0.01".parse().unwrap())),
        })
    };

    let err = handler
        .handle_transaction(header(2), &set_rates(alice()), None)
        .unwrap_err();
    assert!(matches!(err, HandlerError::Unauthorized(sender) if sender == alice()));

    handler
        .handle_transaction(header(2), &set_rates(authority()), None)
        .unwrap();
    let QueryResponse::Market(market) = handler
        .handle_query(header(2), &Query::Market { market_id: 1 })
        .unwrap()
    else {
        panic!("unexpected response");
    };
    assert_eq!(market.fee_rates.taker, "0.01".parse().unwrap());
}

#[test]
fn test_queries_do_not_change_state() {
    let handler = setup();
    handler
        .handle_transaction(header(2), &limit_order(alice(), false, "1.5", 40), None)
        .unwrap();
    let root = handler.state_root();

    let QueryResponse::Markets { markets, page } = handler
        .handle_query(
            header(2),
            &Query::Markets {
                page: PageRequest {
                    count_total: true,
                    ..Default::default()
                },
            },
        )
        .unwrap()
    else {
        panic!("unexpected response");
    };
    assert_eq!(markets.len(), 1);
    assert_eq!(page.total, Some(1));

    let QueryResponse::OrderBook(book) = handler
        .handle_query(header(2), &Query::OrderBook { market_id: 1, depth: 0 })
        .unwrap()
    else {
        panic!("unexpected response");
    };
    assert!(book.buys.is_empty());
    assert_eq!(book.sells.len(), 1);
    assert_eq!(book.sells[0].quantity, U256::from(40u64));

    let QueryResponse::Orders(orders) = handler
        .handle_query(
            header(2),
            &Query::OrdersByOrderer {
                orderer: alice().to_string(),
                market_id: None,
            },
        )
        .unwrap()
    else {
        panic!("unexpected response");
    };
    assert_eq!(orders.len(), 1);

    // Simulating a swap that would fill the resting sell.
    let QueryResponse::Swap(swap) = handler
        .handle_query(
            header(2),
            &Query::SimulateSwapExactIn {
                sender: bob().to_string(),
                routes: vec![1],
                input: coin("uusd", 100),
                min_output: coin("uatom", 1),
            },
        )
        .unwrap()
    else {
        panic!("unexpected response");
    };
    assert!(!swap.output.is_zero());
    assert_eq!(swap.output.denom, "uatom");

    assert_eq!(handler.state_root(), root);
}

#[test]
fn test_concurrent_queries_share_the_store() {
    let handler = setup();
    handler
        .handle_transaction(header(2), &limit_order(alice(), false, "1.5", 40), None)
        .unwrap();
    let root = handler.state_root();

    let simulate = Query::SimulateSwapExactIn {
        sender: bob().to_string(),
        routes: vec![1],
        input: coin("uusd", 30),
        min_output: coin("uatom", 1),
    };
    let expected = handler.handle_query(header(2), &simulate).unwrap();

    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let swap = handler.handle_query(header(2), &simulate).unwrap();
                    let balance = handler.balance(bob(), "uusd").unwrap();
                    (swap, balance)
                })
            })
            .collect();
        for worker in workers {
            let (swap, balance) = worker.join().unwrap();
            assert_eq!(swap, expected);
            assert_eq!(balance, U256::from(1_000u64));
        }
    });

    assert_eq!(handler.state_root(), root);
    assert_eq!(handler.balance(alice(), "uatom").unwrap(), U256::from(960u64));
}

#[test]
fn test_swap_exact_in_and_best_route() {
    let handler = setup();
    handler
        .handle_transaction(header(2), &limit_order(alice(), false, "1.5", 40), None)
        .unwrap();

    let QueryResponse::BestRoute(best) = handler
        .handle_query(
            header(3),
            &Query::BestSwapExactInRoutes {
                input: coin("uusd", 30),
                min_output: coin("uatom", 1),
            },
        )
        .unwrap()
    else {
        panic!("unexpected response");
    };
    assert_eq!(best.routes, vec![1]);

    let result = handler
        .handle_transaction(
            header(3),
            &Msg::SwapExactIn(MsgSwapExactIn {
                sender: bob().to_string(),
                routes: best.routes.clone(),
                input: coin("uusd", 30),
                min_output: coin("uatom", 1),
            }),
            None,
        )
        .unwrap();
    let MsgResponse::SwapExactIn(swap) = result.response else {
        panic!("unexpected response");
    };
    assert_eq!(swap.output, best.output);
    assert_eq!(
        handler.balance(bob(), "uatom").unwrap(),
        U256::from(1_000u64) + swap.output.amount
    );
    assert!(result
        .logs
        .iter()
        .any(|log| log.data.topics()[0] == IExchange::SwapExecuted::SIGNATURE_HASH));
}

#[test]
fn test_end_block_expires_orders() {
    let handler = setup();
    let msg = Msg::PlaceLimitOrder(MsgPlaceLimitOrder {
        sender: alice().to_string(),
        market_id: 1,
        is_buy: true,
        price: "1".parse().unwrap(),
        quantity: U256::from(10u64),
        lifespan: Some(6),
    });
    handler.handle_transaction(header(2), &msg, None).unwrap();

    // The deadline is block 2's time plus 6 seconds, i.e. block 3's time.
    let early = handler.end_block(header(2)).unwrap();
    assert!(early.expired_orders.is_empty());

    let result = handler.end_block(header(3)).unwrap();
    assert_eq!(result.expired_orders, vec![1]);
    let expired = IExchange::OrderExpired::decode_log_data(&result.logs[0].data).unwrap();
    assert_eq!(expired.orderId, 1);
    assert_eq!(expired.refundedQuote, U256::from(10u64));
    assert_eq!(handler.balance(alice(), "uusd").unwrap(), U256::from(1_000u64));
}
