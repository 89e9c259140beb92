//! Exchange transaction handler.

use crate::abi::{decode_calldata, event_log};
use crate::types::{
    parse_address, BlockResult, HandlerError, Msg, MsgResponse, Query, QueryResponse, TxResult,
};
use crate::EXCHANGE_MODULE_ADDRESS;
use alloy_primitives::{Address, Bytes, Log, B256};
use exchange::{
    Amount, BankKeeper, BlockHeader, Coin, Context, Event, Exchange, ExchangeConfig, MemStore,
    OrderSide, ScratchStore, StoreBank,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Dispatches requests to the exchange core over a shared store.
///
/// Every transaction runs in its own atomic context: on error the store is
/// left exactly as it was. Queries take the shared lock and run in a
/// discarded overlay.
#[derive(Debug)]
pub struct ExchangeHandler {
    store: RwLock<MemStore>,
    exchange: Exchange<StoreBank>,
    authority: Address,
}

impl ExchangeHandler {
    /// Create a handler over an empty store. `authority` may update params
    /// and market fee rates.
    pub fn new(authority: Address) -> Self {
        Self::with_config(authority, ExchangeConfig::default())
    }

    pub fn with_config(authority: Address, config: ExchangeConfig) -> Self {
        Self {
            store: RwLock::new(MemStore::new()),
            exchange: Exchange::with_config(StoreBank::new(), config),
            authority,
        }
    }

    pub fn exchange(&self) -> &Exchange<StoreBank> {
        &self.exchange
    }

    pub fn authority(&self) -> Address {
        self.authority
    }

    /// Execute `msg` in block `header`, metered against `gas_limit` if given.
    pub fn handle_transaction(
        &self,
        header: BlockHeader,
        msg: &Msg,
        gas_limit: Option<u64>,
    ) -> Result<TxResult, HandlerError> {
        let sender = msg.validate_basic()?;
        if matches!(msg, Msg::UpdateParams(_) | Msg::SetMarketFeeRates(_)) && sender != self.authority {
            return Err(HandlerError::Unauthorized(sender));
        }
        debug!(target: "exchange_app", msg = msg.type_name(), %sender, height = header.height, "Handling transaction");

        let mut store = self.store.write();
        let mut ctx = Context::new(&mut *store, header);
        if let Some(limit) = gas_limit {
            ctx = ctx.with_gas_limit(limit);
        }

        let result = ctx.atomic(|ctx| self.dispatch(ctx, sender, msg));
        let gas_used = ctx.gas_meter().consumed();
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(target: "exchange_app", msg = msg.type_name(), %sender, gas_used, %err, "Transaction failed");
                return Err(err.into());
            }
        };

        let events = ctx.take_events();
        let logs = self.logs(&events);
        info!(target: "exchange_app", msg = msg.type_name(), %sender, gas_used, events = events.len(), "Transaction executed");

        Ok(TxResult {
            response,
            events,
            logs,
            gas_used,
        })
    }

    /// Decode exchange calldata sent by `caller` and execute it.
    pub fn handle_calldata(
        &self,
        header: BlockHeader,
        caller: Address,
        calldata: &Bytes,
        gas_limit: Option<u64>,
    ) -> Result<TxResult, HandlerError> {
        let msg = decode_calldata(caller, calldata)?;
        self.handle_transaction(header, &msg, gas_limit)
    }

    fn dispatch(
        &self,
        ctx: &mut Context<'_>,
        sender: Address,
        msg: &Msg,
    ) -> exchange::Result<MsgResponse> {
        let response = match msg {
            Msg::CreateMarket(msg) => MsgResponse::CreateMarket(self.exchange.create_market(
                ctx,
                sender,
                &msg.base_denom,
                &msg.quote_denom,
            )?),
            Msg::PlaceLimitOrder(msg) => {
                MsgResponse::PlaceLimitOrder(self.exchange.place_limit_order(
                    ctx,
                    msg.market_id,
                    sender,
                    OrderSide::from_is_buy(msg.is_buy),
                    msg.price,
                    msg.quantity,
                    msg.lifespan,
                )?)
            }
            Msg::PlaceMarketOrder(msg) => {
                MsgResponse::PlaceMarketOrder(self.exchange.place_market_order(
                    ctx,
                    msg.market_id,
                    sender,
                    OrderSide::from_is_buy(msg.is_buy),
                    msg.quantity,
                )?)
            }
            Msg::CancelOrder(msg) => {
                MsgResponse::CancelOrder(self.exchange.cancel_order(ctx, sender, msg.order_id)?)
            }
            Msg::SwapExactIn(msg) => MsgResponse::SwapExactIn(self.exchange.swap_exact_in(
                ctx,
                sender,
                &msg.routes,
                msg.input.clone(),
                msg.min_output.clone(),
                false,
            )?),
            Msg::UpdateParams(msg) => {
                self.exchange.set_params(ctx, msg.params.clone())?;
                MsgResponse::UpdateParams
            }
            Msg::SetMarketFeeRates(msg) => {
                MsgResponse::SetMarketFeeRates(self.exchange.set_market_fee_rates(
                    ctx,
                    msg.market_id,
                    msg.fee_rates,
                )?)
            }
        };
        Ok(response)
    }

    /// Answer `query` against the current state without changing it.
    ///
    /// Runs under the shared lock: anything the query writes lands in a
    /// scratch overlay that is dropped afterwards.
    pub fn handle_query(
        &self,
        header: BlockHeader,
        query: &Query,
    ) -> Result<QueryResponse, HandlerError> {
        let store = self.store.read();
        let mut scratch = ScratchStore::new(&*store);
        let mut ctx = Context::new(&mut scratch, header);
        let exchange = &self.exchange;

        let response = match query {
            Query::Params => exchange.query_params(&mut ctx).map(QueryResponse::Params)?,
            Query::Market { market_id } => exchange
                .query_market(&mut ctx, *market_id)
                .map(QueryResponse::Market)?,
            Query::Markets { page } => {
                let (markets, page) = exchange.query_markets(&mut ctx, page)?;
                QueryResponse::Markets { markets, page }
            }
            Query::Order { order_id } => exchange
                .query_order(&mut ctx, *order_id)
                .map(QueryResponse::Order)?,
            Query::OrdersByOrderer { orderer, market_id } => {
                let orderer = parse_address(orderer)?;
                exchange
                    .query_orders_by_orderer(&mut ctx, orderer, *market_id)
                    .map(QueryResponse::Orders)?
            }
            Query::OrderBook { market_id, depth } => exchange
                .query_order_book(&mut ctx, *market_id, *depth)
                .map(QueryResponse::OrderBook)?,
            Query::AllRoutes {
                denom_in,
                denom_out,
            } => exchange
                .find_all_routes(&mut ctx, denom_in, denom_out)
                .map(QueryResponse::Routes)?,
            Query::SimulateSwapExactIn {
                sender,
                routes,
                input,
                min_output,
            } => {
                // An empty sender simulates without a balance check.
                let orderer = if sender.is_empty() {
                    Address::ZERO
                } else {
                    parse_address(sender)?
                };
                exchange
                    .swap_exact_in(&mut ctx, orderer, routes, input.clone(), min_output.clone(), true)
                    .map(QueryResponse::Swap)?
            }
            Query::BestSwapExactInRoutes { input, min_output } => exchange
                .best_swap_exact_in_routes(&mut ctx, input, min_output)
                .map(QueryResponse::BestRoute)?,
            Query::Balance { address, denom } => {
                let address = parse_address(address)?;
                let amount = exchange.bank().balance(&mut ctx, address, denom)?;
                QueryResponse::Balance(Coin::new(denom.clone(), amount))
            }
        };
        Ok(response)
    }

    /// End-of-block hook: cancel every order whose deadline has passed.
    pub fn end_block(&self, header: BlockHeader) -> Result<BlockResult, HandlerError> {
        let mut store = self.store.write();
        let mut ctx = Context::new(&mut *store, header);
        let expired_orders = self.exchange.cancel_expired_orders(&mut ctx)?;
        let events = ctx.take_events();
        let logs = self.logs(&events);
        if !expired_orders.is_empty() {
            info!(target: "exchange_app", height = header.height, expired = expired_orders.len(), "Expired orders cancelled");
        }
        Ok(BlockResult {
            expired_orders,
            events,
            logs,
        })
    }

    /// Mint `coins` to `address`. Genesis and test setup only.
    pub fn fund_account(&self, address: Address, coins: &[Coin]) -> Result<(), HandlerError> {
        let mut store = self.store.write();
        let mut ctx = Context::new(&mut *store, BlockHeader::default());
        ctx.atomic(|ctx| self.exchange.bank().mint_coins(ctx, address, coins))?;
        Ok(())
    }

    pub fn balance(&self, address: Address, denom: &str) -> Result<Amount, HandlerError> {
        let store = self.store.read();
        let mut scratch = ScratchStore::new(&*store);
        let mut ctx = Context::new(&mut scratch, BlockHeader::default());
        Ok(self.exchange.bank().balance(&mut ctx, address, denom)?)
    }

    /// Commitment to the full store contents.
    pub fn state_root(&self) -> B256 {
        self.store.read().root_hash()
    }

    fn logs(&self, events: &[Event]) -> Vec<Log> {
        events
            .iter()
            .map(|event| event_log(EXCHANGE_MODULE_ADDRESS, event))
            .collect()
    }
}
