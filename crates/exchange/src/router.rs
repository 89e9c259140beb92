//! Multi-hop swaps across markets.

use crate::bank::BankKeeper;
use crate::context::Context;
use crate::error::{ExchangeError, Result};
use crate::events::Event;
use crate::exchange::Exchange;
use crate::keys;
use crate::market::{must_get_market, Market};
use crate::matching::{emit_fill_events, execute_orders, Budget, Taker};
use crate::settlement::Settlement;
use crate::types::{Address, Amount, Coin, OrderSide};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;
use tracing::{debug, info};

/// A single hop of a resolved route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHop {
    pub market: Market,
    /// Side of the internal market order: sell when the running denom is the
    /// market's base, buy when it is the quote.
    pub side: OrderSide,
}

impl RouteHop {
    pub fn denom_in(&self) -> &str {
        self.market.deposit_denom(self.side)
    }

    pub fn denom_out(&self) -> &str {
        self.market.receive_denom(self.side)
    }
}

/// Amounts of one executed hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopResult {
    pub market_id: u64,
    pub side: OrderSide,
    /// Spent, fees included.
    pub input: Coin,
    pub output: Coin,
}

/// Result of a swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapResult {
    pub output: Coin,
    pub hops: Vec<HopResult>,
}

/// Best route found for a swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestRoute {
    pub routes: Vec<u64>,
    pub output: Coin,
}

/// Undirected graph of denoms connected by markets.
#[derive(Debug, Clone, Default)]
pub struct RouteGraph {
    /// Each denom's (market id, other denom) edges, in ascending market id.
    edges: BTreeMap<String, Vec<(u64, String)>>,
}

impl RouteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of every market in the store.
    pub fn load(ctx: &mut Context<'_>) -> Result<Self> {
        let mut market_ids = Vec::new();
        ctx.scan_prefix(&keys::market_key_prefix(), |key, _| {
            match keys::parse_market_key(key) {
                Some(market_id) => market_ids.push(market_id),
                None => panic!("malformed market key: 0x{}", hex::encode(key)),
            }
            ControlFlow::Continue(())
        })?;

        let mut graph = Self::new();
        for market_id in market_ids {
            graph.add_market(&must_get_market(ctx, market_id)?);
        }
        Ok(graph)
    }

    /// Add both directions of `market`. Markets must be added in ascending
    /// id order.
    pub fn add_market(&mut self, market: &Market) {
        self.edges
            .entry(market.base_denom.clone())
            .or_default()
            .push((market.id, market.quote_denom.clone()));
        self.edges
            .entry(market.quote_denom.clone())
            .or_default()
            .push((market.id, market.base_denom.clone()));
    }

    /// Every market sequence from `denom_in` to `denom_out` of at most
    /// `max_hops` markets that never revisits a denom, in lexicographic
    /// order of market ids.
    pub fn find_routes(&self, denom_in: &str, denom_out: &str, max_hops: usize) -> Vec<Vec<u64>> {
        let mut routes = Vec::new();
        if denom_in == denom_out || max_hops == 0 {
            return routes;
        }
        let mut visited = BTreeSet::from([denom_in]);
        let mut path = Vec::new();
        self.walk(denom_in, denom_out, max_hops, &mut visited, &mut path, &mut routes);
        routes
    }

    fn walk<'g>(
        &'g self,
        current: &str,
        target: &str,
        max_hops: usize,
        visited: &mut BTreeSet<&'g str>,
        path: &mut Vec<u64>,
        routes: &mut Vec<Vec<u64>>,
    ) {
        let Some(edges) = self.edges.get(current) else {
            return;
        };
        for (market_id, next) in edges {
            if visited.contains(next.as_str()) {
                continue;
            }
            path.push(*market_id);
            if next == target {
                routes.push(path.clone());
            } else if path.len() < max_hops {
                visited.insert(next.as_str());
                self.walk(next, target, max_hops, visited, path, routes);
                visited.remove(next.as_str());
            }
            path.pop();
        }
    }
}

impl<B: BankKeeper> Exchange<B> {
    /// Every route from `denom_in` to `denom_out` within the configured hop
    /// limit.
    pub fn find_all_routes(
        &self,
        ctx: &mut Context<'_>,
        denom_in: &str,
        denom_out: &str,
    ) -> Result<Vec<Vec<u64>>> {
        let graph = RouteGraph::load(ctx)?;
        Ok(graph.find_routes(denom_in, denom_out, self.config().max_routing_hops))
    }

    /// Resolve the side of every hop of `routes` starting from `denom_in`,
    /// checking that the route ends in `denom_out`.
    pub fn resolve_route(
        &self,
        ctx: &mut Context<'_>,
        routes: &[u64],
        denom_in: &str,
        denom_out: &str,
    ) -> Result<Vec<RouteHop>> {
        let max_hops = self.config().max_routing_hops;
        if routes.is_empty() || routes.len() > max_hops {
            return Err(ExchangeError::InvalidRoute(format!(
                "route must have between 1 and {max_hops} markets, got {}",
                routes.len()
            )));
        }

        let mut hops = Vec::with_capacity(routes.len());
        let mut denom = denom_in.to_string();
        for &market_id in routes {
            let market = must_get_market(ctx, market_id)?;
            let side = if denom == market.base_denom {
                OrderSide::Sell
            } else if denom == market.quote_denom {
                OrderSide::Buy
            } else {
                return Err(ExchangeError::InvalidRoute(format!(
                    "market {market_id} does not trade {denom}"
                )));
            };
            let hop = RouteHop { market, side };
            denom = hop.denom_out().to_string();
            hops.push(hop);
        }
        if denom != denom_out {
            return Err(ExchangeError::InvalidRoute(format!(
                "route ends in {denom}, not {denom_out}"
            )));
        }
        Ok(hops)
    }

    /// Swap exactly `input` along `routes`, requiring at least `min_output`.
    ///
    /// Each hop is a market order spending the previous hop's proceeds, taker
    /// fee included. With `simulate` the swap runs in a discarded overlay and
    /// moves no balances, but returns what the real swap would.
    pub fn swap_exact_in(
        &self,
        ctx: &mut Context<'_>,
        orderer: Address,
        routes: &[u64],
        input: Coin,
        min_output: Coin,
        simulate: bool,
    ) -> Result<SwapResult> {
        input.validate()?;
        min_output.validate()?;
        if input.is_zero() {
            return Err(ExchangeError::InvalidCoin(format!(
                "input amount must be positive: {input}"
            )));
        }

        if simulate {
            ctx.simulate(|ctx| self.execute_swap(ctx, orderer, routes, &input, &min_output, true))
        } else {
            ctx.atomic(|ctx| self.execute_swap(ctx, orderer, routes, &input, &min_output, false))
        }
    }

    fn execute_swap(
        &self,
        ctx: &mut Context<'_>,
        orderer: Address,
        routes: &[u64],
        input: &Coin,
        min_output: &Coin,
        simulate: bool,
    ) -> Result<SwapResult> {
        let route = self.resolve_route(ctx, routes, &input.denom, &min_output.denom)?;

        if !simulate || !orderer.is_zero() {
            let available = self.bank().balance(ctx, orderer, &input.denom)?;
            if available < input.amount {
                return Err(ExchangeError::InsufficientFunds {
                    address: orderer,
                    denom: input.denom.clone(),
                    available,
                    required: input.amount,
                });
            }
        }

        let mut running: Amount = input.amount;
        let mut hops = Vec::with_capacity(route.len());
        for hop in &route {
            let market = &hop.market;
            let taker = Taker {
                address: orderer,
                side: hop.side,
                price_limit: None,
            };
            let budget = match hop.side {
                OrderSide::Sell => Budget::BaseFunds(running),
                OrderSide::Buy => Budget::QuoteFunds(running),
            };
            let fee_rates = self.fee_rates(ctx, market)?;
            let mut settlement = Settlement::new(market.escrow_address);
            let outcome = execute_orders(
                ctx,
                market,
                fee_rates,
                &taker,
                budget,
                &mut settlement,
                self.fee_collector(),
            )?;
            if !simulate {
                settlement.apply(ctx, self.bank())?;
            }
            emit_fill_events(ctx, market, &taker, None, &outcome.fills);

            debug!(
                target: "exchange",
                market_id = market.id,
                side = %hop.side,
                budget = %running,
                paid = %outcome.paid,
                received = %outcome.received,
                simulate,
                "Executed swap hop"
            );
            hops.push(HopResult {
                market_id: market.id,
                side: hop.side,
                input: Coin::new(hop.denom_in(), outcome.paid),
                output: Coin::new(hop.denom_out(), outcome.received),
            });
            running = outcome.received;
        }

        let output = Coin::new(min_output.denom.clone(), running);
        if output.is_zero() || output.amount < min_output.amount {
            return Err(ExchangeError::InsufficientOutput {
                output,
                min_output: min_output.clone(),
            });
        }

        ctx.emit_event(Event::SwapExecuted {
            orderer,
            routes: routes.to_vec(),
            input: input.clone(),
            output: output.clone(),
        });
        if !simulate {
            info!(
                target: "exchange",
                orderer = ?orderer,
                routes = ?routes,
                %input,
                %output,
                "Swapped exact in"
            );
        }
        Ok(SwapResult { output, hops })
    }

    /// The route yielding the largest output for `input`, among all routes
    /// that satisfy `min_output`.
    ///
    /// Ties go to the lexicographically smallest route. Fails with
    /// `RouteNotFound` when no route satisfies `min_output`.
    pub fn best_swap_exact_in_routes(
        &self,
        ctx: &mut Context<'_>,
        input: &Coin,
        min_output: &Coin,
    ) -> Result<BestRoute> {
        input.validate()?;
        min_output.validate()?;
        if input.is_zero() {
            return Err(ExchangeError::InvalidCoin(format!(
                "input amount must be positive: {input}"
            )));
        }

        let no_route = || {
            ExchangeError::RouteNotFound(format!("{} to {}", input.denom, min_output.denom))
        };
        let candidates = self.find_all_routes(ctx, &input.denom, &min_output.denom)?;
        if candidates.is_empty() {
            return Err(no_route());
        }

        let mut best: Option<BestRoute> = None;
        for routes in candidates {
            let result = self.swap_exact_in(
                ctx,
                Address::ZERO,
                &routes,
                input.clone(),
                min_output.clone(),
                true,
            );
            match result {
                Ok(result) => {
                    debug!(target: "exchange", routes = ?routes, output = %result.output, "Evaluated route");
                    let better = best
                        .as_ref()
                        .map_or(true, |best| result.output.amount > best.output.amount);
                    if better {
                        best = Some(BestRoute {
                            routes,
                            output: result.output,
                        });
                    }
                }
                Err(ExchangeError::InsufficientOutput { output, .. }) => {
                    debug!(target: "exchange", routes = ?routes, %output, "Route below minimum output");
                }
                Err(err @ ExchangeError::OutOfGas { .. }) => return Err(err),
                Err(err) => {
                    return Err(ExchangeError::Internal(format!(
                        "simulating route {routes:?}: {err}"
                    )))
                }
            }
        }
        best.ok_or_else(no_route)
    }
}
