//! Pending-order execution pipeline.
//!
//! One strictly sequential pass per cycle over the outstanding orders, in
//! insertion order, against a single live price/cash snapshot. Order N is
//! constrained by whatever orders 1..N-1 already did this cycle: cash and
//! prices mutate as each order executes, and a running ledger tracks shares
//! committed by earlier sells so the same inventory cannot be spent twice.
//! This sequencing is a documented contract — do not parallelize it.
//!
//! Once an order passes its sufficiency check, the mutations that follow
//! are infallible by construction (pre-validated quantities moving between
//! accounts), so there is no rollback path.

use crate::book::OrderBook;
use crate::config::SimConfig;
use crate::domain::{
    FailedOrder, NotificationKind, NotificationLedger, NotificationRequest, OrderAction,
    OrderId, OrderKind, PendingOrder, Portfolio, ShortPosition, TradeRecord, TradeSide,
};
use crate::engine::market_maker::MarketMaker;
use crate::engine::price_gen::apply_market_impact;
use crate::error::{ExpiryReason, FailureReason, SimError};
use crate::phase::PhaseEngine;
use crate::pricing;
use std::collections::BTreeMap;

/// Mutable slices of the simulation the pipeline works against.
pub(crate) struct PipelineEnv<'a> {
    pub config: &'a SimConfig,
    pub cycle: u64,
    pub stocks: &'a mut [crate::domain::Stock],
    pub books: &'a mut BTreeMap<String, OrderBook>,
    pub portfolio: &'a mut Portfolio,
    pub market_maker: &'a mut MarketMaker,
    pub phase: &'a PhaseEngine,
    pub next_order_id: &'a mut u64,
}

/// Player-visible results of one pipeline pass.
#[derive(Debug, Default)]
pub(crate) struct PipelineOutcome {
    pub trades: Vec<TradeRecord>,
    pub failed: Vec<FailedOrder>,
    pub notifications: Vec<NotificationRequest>,
}

/// The explicit accumulator threaded through the pass.
///
/// Sell sufficiency reads holdings as of the start of the pass minus what
/// earlier sells this cycle already committed; live holdings mutate per
/// execution and must not be double-counted.
struct CycleLedger {
    start_holdings: BTreeMap<String, u32>,
    sold: BTreeMap<String, u32>,
    loans_requested: usize,
}

impl CycleLedger {
    fn new(portfolio: &Portfolio) -> Self {
        Self {
            start_holdings: portfolio.holdings.clone(),
            sold: BTreeMap::new(),
            loans_requested: 0,
        }
    }

    fn sellable(&self, symbol: &str) -> u32 {
        let held = self.start_holdings.get(symbol).copied().unwrap_or(0);
        held.saturating_sub(self.sold.get(symbol).copied().unwrap_or(0))
    }

    fn commit_sale(&mut self, symbol: &str, shares: u32) {
        *self.sold.entry(symbol.to_string()).or_insert(0) += shares;
    }
}

enum Attempt {
    /// Fully executed; the order is consumed.
    Executed,
    /// Partially executed; the remainder re-enters the queue as a fresh
    /// zero-delay market order.
    Partial { remainder: PendingOrder },
    /// Not executed; the order stays pending.
    Stay,
}

/// Run the full per-cycle pass: execution, expiry, tick.
pub(crate) fn run(
    env: &mut PipelineEnv<'_>,
    pending: &mut Vec<PendingOrder>,
    notifications: &dyn NotificationLedger,
) -> Result<PipelineOutcome, SimError> {
    let mut out = PipelineOutcome::default();
    let mut ledger = CycleLedger::new(env.portfolio);
    let mut kept: Vec<PendingOrder> = Vec::with_capacity(pending.len());
    let mut requeued: Vec<PendingOrder> = Vec::new();

    // ── Pass 1: execution ──────────────────────────────────────────────
    for mut order in std::mem::take(pending) {
        // The creation cycle never counts toward execution.
        if order.is_new {
            kept.push(order);
            continue;
        }
        let price = stock_price(env.stocks, &order.symbol)?;
        if !is_triggered(&mut order, price) {
            kept.push(order);
            continue;
        }
        match try_execute(env, &mut ledger, notifications, &mut out, &order)? {
            Attempt::Executed => {}
            Attempt::Partial { remainder } => requeued.push(remainder),
            Attempt::Stay => kept.push(order),
        }
    }

    // ── Pass 2: expiry reporting ───────────────────────────────────────
    // Orders lapsing on this cycle's tick get a kind-specific reason and a
    // notification carrying their id, before the generic tick removes them.
    for order in &kept {
        if !order.expires_this_cycle() {
            continue;
        }
        let reason = FailureReason::Expired {
            reason: ExpiryReason::for_kind(&order.kind, order.stop_triggered),
        };
        out.failed.push(FailedOrder {
            cycle: env.cycle,
            order_id: order.id,
            symbol: order.symbol.clone(),
            reason: reason.clone(),
        });
        out.notifications.push(NotificationRequest {
            kind: NotificationKind::OrderExpired,
            message_key: reason.message_key(order.id),
            auto_dismiss: false,
            order_id: Some(order.id),
        });
    }

    // ── Pass 3: validity tick ──────────────────────────────────────────
    kept.retain_mut(|order| {
        if order.is_new {
            order.is_new = false;
            return true;
        }
        order.remaining_cycles = order.remaining_cycles.saturating_sub(1);
        if order.remaining_cycles == 0 && !order.kind.is_market() {
            // Lapsed: pull the mirrored book entry and give collateral back.
            if let Some(book) = env.books.get_mut(&order.symbol) {
                book.remove_by_origin(order.id);
            }
            if let Some(collateral) = order.locked_collateral {
                env.portfolio.cash += collateral;
            }
            return false;
        }
        true
    });

    // Requeued remainders skip this cycle's tick so they fire next cycle.
    *pending = kept;
    pending.extend(requeued);
    Ok(out)
}

/// Trigger check; arms the sticky stop flag as a side effect.
fn is_triggered(order: &mut PendingOrder, price: f64) -> bool {
    let side = order.action.side();
    match order.kind {
        OrderKind::Market => order.remaining_cycles <= 1,
        OrderKind::Limit { limit } => match side {
            TradeSide::Buy => price <= limit,
            TradeSide::Sell => price >= limit,
        },
        OrderKind::Stop { stop } => match side {
            TradeSide::Buy => price >= stop,
            TradeSide::Sell => price <= stop,
        },
        OrderKind::StopLimit { stop, limit } => {
            if !order.stop_triggered {
                let armed = match side {
                    TradeSide::Buy => price >= stop,
                    TradeSide::Sell => price <= stop,
                };
                if armed {
                    order.stop_triggered = true;
                }
            }
            order.stop_triggered
                && match side {
                    TradeSide::Buy => price <= limit,
                    TradeSide::Sell => price >= limit,
                }
        }
    }
}

fn try_execute(
    env: &mut PipelineEnv<'_>,
    ledger: &mut CycleLedger,
    notifications: &dyn NotificationLedger,
    out: &mut PipelineOutcome,
    order: &PendingOrder,
) -> Result<Attempt, SimError> {
    match order.action {
        OrderAction::Buy => execute_buy(env, ledger, notifications, out, order),
        OrderAction::Sell => execute_sell(env, ledger, notifications, out, order),
        OrderAction::ShortSell => execute_short_sell(env, out, order),
        OrderAction::BuyToCover => execute_cover(env, ledger, notifications, out, order),
    }
}

// ── Buy ────────────────────────────────────────────────────────────────

fn execute_buy(
    env: &mut PipelineEnv<'_>,
    ledger: &mut CycleLedger,
    notifications: &dyn NotificationLedger,
    out: &mut PipelineOutcome,
    order: &PendingOrder,
) -> Result<Attempt, SimError> {
    let price = stock_price(env.stocks, &order.symbol)?;
    let multiplier = spread_multiplier(env, &order.symbol)?;
    let exec = pricing::execute(
        &env.config.mechanics,
        price,
        order.shares,
        TradeSide::Buy,
        multiplier,
    );

    let plan = match plan_loan(env, ledger, order, exec.total) {
        Ok(plan) => plan,
        Err(reason) => {
            record_failure(out, notifications, env.cycle, order, reason);
            return Ok(Attempt::Stay);
        }
    };

    // Sufficiency confirmed: leave the book first, then settle.
    remove_book_entry(env, order);
    settle_buy_side(env, ledger, plan, exec.total);
    env.portfolio.add_shares(&order.symbol, order.shares);
    push_trade(out, env.cycle, order, order.shares, &exec);
    finish_market_touch(env, &order.symbol, TradeSide::Buy, order.shares)?;
    Ok(Attempt::Executed)
}

// ── Sell ───────────────────────────────────────────────────────────────

fn execute_sell(
    env: &mut PipelineEnv<'_>,
    ledger: &mut CycleLedger,
    notifications: &dyn NotificationLedger,
    out: &mut PipelineOutcome,
    order: &PendingOrder,
) -> Result<Attempt, SimError> {
    let available = ledger.sellable(&order.symbol);
    if order.shares > available {
        record_failure(
            out,
            notifications,
            env.cycle,
            order,
            FailureReason::InsufficientShares {
                required: order.shares,
                available,
            },
        );
        return Ok(Attempt::Stay);
    }

    let price = stock_price(env.stocks, &order.symbol)?;
    let multiplier = spread_multiplier(env, &order.symbol)?;
    let exec = pricing::execute(
        &env.config.mechanics,
        price,
        order.shares,
        TradeSide::Sell,
        multiplier,
    );

    remove_book_entry(env, order);
    ledger.commit_sale(&order.symbol, order.shares);
    env.portfolio.cash += exec.total;
    env.portfolio.remove_shares(&order.symbol, order.shares);
    push_trade(out, env.cycle, order, order.shares, &exec);
    finish_market_touch(env, &order.symbol, TradeSide::Sell, order.shares)?;
    Ok(Attempt::Executed)
}

// ── Short sell ─────────────────────────────────────────────────────────

fn execute_short_sell(
    env: &mut PipelineEnv<'_>,
    out: &mut PipelineOutcome,
    order: &PendingOrder,
) -> Result<Attempt, SimError> {
    let price = stock_price(env.stocks, &order.symbol)?;
    let multiplier = spread_multiplier(env, &order.symbol)?;
    let exec = pricing::execute(
        &env.config.mechanics,
        price,
        order.shares,
        TradeSide::Sell,
        multiplier,
    );

    remove_book_entry(env, order);
    env.portfolio.cash += exec.total;

    // Collateral was locked out of cash at placement; it moves into the
    // position here and comes back share-by-share on cover.
    let collateral = order.locked_collateral.unwrap_or(0.0);
    let position = env
        .portfolio
        .shorts
        .entry(order.symbol.clone())
        .or_insert_with(|| ShortPosition {
            symbol: order.symbol.clone(),
            shares: 0,
            entry_price: 0.0,
            collateral: 0.0,
        });
    let combined = f64::from(position.shares) + f64::from(order.shares);
    position.entry_price = (position.entry_price * f64::from(position.shares)
        + exec.effective_price * f64::from(order.shares))
        / combined;
    position.shares += order.shares;
    position.collateral += collateral;

    push_trade(out, env.cycle, order, order.shares, &exec);
    finish_market_touch(env, &order.symbol, TradeSide::Sell, order.shares)?;
    Ok(Attempt::Executed)
}

// ── Buy to cover ───────────────────────────────────────────────────────

fn execute_cover(
    env: &mut PipelineEnv<'_>,
    ledger: &mut CycleLedger,
    notifications: &dyn NotificationLedger,
    out: &mut PipelineOutcome,
    order: &PendingOrder,
) -> Result<Attempt, SimError> {
    let held_short = env
        .portfolio
        .shorts
        .get(&order.symbol)
        .map(|p| p.shares)
        .unwrap_or(0);
    if order.shares > held_short {
        record_failure(
            out,
            notifications,
            env.cycle,
            order,
            FailureReason::InsufficientShares {
                required: order.shares,
                available: held_short,
            },
        );
        return Ok(Attempt::Stay);
    }

    let price = stock_price(env.stocks, &order.symbol)?;
    let multiplier = spread_multiplier(env, &order.symbol)?;
    let cost_of = |shares: u32| {
        pricing::execute(
            &env.config.mechanics,
            price,
            shares,
            TradeSide::Buy,
            multiplier,
        )
    };

    // Budget is live cash plus whatever the attached loan can still net,
    // recomputed against the actual execution price below.
    let budget = env.portfolio.cash + net_loan_capacity(env, ledger, order);
    let affordable = max_affordable_shares(order.shares, budget, |n| cost_of(n).total);

    if affordable == 0 {
        record_failure(
            out,
            notifications,
            env.cycle,
            order,
            FailureReason::InsufficientFunds {
                required: cost_of(order.shares).total,
                available: budget,
                loan_limit_reached: false,
            },
        );
        return Ok(Attempt::Stay);
    }

    let exec = cost_of(affordable);
    let plan = match plan_loan(env, ledger, order, exec.total) {
        Ok(plan) => plan,
        Err(reason) => {
            // Unreachable when the budget math and loan plan agree; surface
            // it as a plain failure rather than executing on bad numbers.
            record_failure(out, notifications, env.cycle, order, reason);
            return Ok(Attempt::Stay);
        }
    };

    remove_book_entry(env, order);
    settle_buy_side(env, ledger, plan, exec.total);

    // Shrink the short position and hand back proportional collateral.
    let mut closed = false;
    if let Some(position) = env.portfolio.shorts.get_mut(&order.symbol) {
        let fraction = f64::from(affordable) / f64::from(position.shares);
        let released = position.collateral * fraction;
        position.collateral -= released;
        position.shares -= affordable;
        env.portfolio.cash += released;
        closed = position.shares == 0;
    }
    if closed {
        env.portfolio.shorts.remove(&order.symbol);
    }

    push_trade(out, env.cycle, order, affordable, &exec);
    finish_market_touch(env, &order.symbol, TradeSide::Buy, affordable)?;

    if affordable == order.shares {
        return Ok(Attempt::Executed);
    }

    // Forward progress: the exact remainder re-queues as a brand-new
    // zero-delay market order and fires next cycle.
    let id = OrderId(*env.next_order_id);
    *env.next_order_id += 1;
    Ok(Attempt::Partial {
        remainder: PendingOrder {
            id,
            symbol: order.symbol.clone(),
            action: OrderAction::BuyToCover,
            shares: order.shares - affordable,
            kind: OrderKind::Market,
            reference_price: price,
            remaining_cycles: 1,
            stop_triggered: false,
            is_new: false,
            loan_request: order.loan_request.clone(),
            locked_collateral: None,
        },
    })
}

/// Largest `n ≤ shares` with `cost(n) ≤ budget`. `cost` is monotone in `n`,
/// so a binary search over the share count suffices.
fn max_affordable_shares(shares: u32, budget: f64, cost: impl Fn(u32) -> f64) -> u32 {
    if cost(shares) <= budget {
        return shares;
    }
    let (mut lo, mut hi) = (0u32, shares);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if cost(mid) <= budget {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

// ── Shared plumbing ────────────────────────────────────────────────────

/// A loan draw planned against the actual execution total.
struct LoanPlan {
    principal: f64,
    rate: f64,
    duration_cycles: u32,
    /// Net cash disbursed (principal minus origination fee).
    net: f64,
}

/// Decide whether the order can pay `total`, drawing on its attached loan
/// if cash falls short. The principal is recomputed so the net disbursement
/// exactly covers the shortfall, capped by the requested amount and the
/// concurrent-loan limit.
fn plan_loan(
    env: &PipelineEnv<'_>,
    ledger: &CycleLedger,
    order: &PendingOrder,
    total: f64,
) -> Result<Option<LoanPlan>, FailureReason> {
    let cash = env.portfolio.cash;
    if total <= cash {
        return Ok(None);
    }
    let Some(request) = &order.loan_request else {
        return Err(FailureReason::InsufficientFunds {
            required: total,
            available: cash,
            loan_limit_reached: false,
        });
    };

    // Booked loans plus loans earlier orders in this pass already claimed.
    if env.portfolio.loans.len() + ledger.loans_requested >= env.config.loan.max_concurrent {
        return Err(FailureReason::InsufficientFunds {
            required: total,
            available: cash,
            loan_limit_reached: true,
        });
    }

    let fee = env.config.loan.origination_fee_percent;
    let shortfall = total - cash;
    let principal = shortfall / (1.0 - fee);
    if principal > request.amount + 1e-9 {
        return Err(FailureReason::InsufficientFunds {
            required: total,
            available: cash + request.amount * (1.0 - fee),
            loan_limit_reached: false,
        });
    }

    Ok(Some(LoanPlan {
        principal,
        rate: request.rate,
        duration_cycles: request.duration_cycles,
        net: shortfall,
    }))
}

/// Net cash an attached loan could still contribute, for budget math.
fn net_loan_capacity(env: &PipelineEnv<'_>, ledger: &CycleLedger, order: &PendingOrder) -> f64 {
    match &order.loan_request {
        Some(request)
            if env.portfolio.loans.len() + ledger.loans_requested
                < env.config.loan.max_concurrent =>
        {
            request.amount * (1.0 - env.config.loan.origination_fee_percent)
        }
        _ => 0.0,
    }
}

/// Book the planned loan (if any) and pay for a buy-side execution.
fn settle_buy_side(
    env: &mut PipelineEnv<'_>,
    ledger: &mut CycleLedger,
    plan: Option<LoanPlan>,
    total: f64,
) {
    if let Some(plan) = plan {
        ledger.loans_requested += 1;
        env.portfolio.cash += plan.net;
        env.portfolio.loans.push(crate::domain::Loan {
            principal: plan.principal,
            rate: plan.rate,
            remaining_cycles: plan.duration_cycles,
            accrued_interest: 0.0,
        });
    }
    env.portfolio.cash -= total;
}

fn remove_book_entry(env: &mut PipelineEnv<'_>, order: &PendingOrder) {
    if let Some(book) = env.books.get_mut(&order.symbol) {
        book.remove_by_origin(order.id);
    }
}

fn push_trade(
    out: &mut PipelineOutcome,
    cycle: u64,
    order: &PendingOrder,
    shares: u32,
    exec: &pricing::Execution,
) {
    out.trades.push(TradeRecord {
        cycle,
        order_id: Some(order.id),
        symbol: order.symbol.clone(),
        action: order.action,
        shares,
        price: exec.effective_price,
        fee: exec.fee,
        total: exec.total,
    });
}

/// Post-execution side effects on the market: price impact, then the
/// market maker absorbing the other side.
fn finish_market_touch(
    env: &mut PipelineEnv<'_>,
    symbol: &str,
    side: TradeSide,
    shares: u32,
) -> Result<(), SimError> {
    let stock = env
        .stocks
        .iter_mut()
        .find(|s| s.symbol == symbol)
        .ok_or_else(|| SimError::UnknownSymbol(symbol.to_string()))?;
    apply_market_impact(stock, side, shares, &env.config.market);
    env.market_maker.record_fill(symbol, side, shares);
    Ok(())
}

fn record_failure(
    out: &mut PipelineOutcome,
    notifications: &dyn NotificationLedger,
    cycle: u64,
    order: &PendingOrder,
    reason: FailureReason,
) {
    let key = reason.message_key(order.id);
    // Idempotent across cycles: while the same order keeps failing the same
    // way and its alert is still showing, stay quiet.
    if notifications.exists(&key) {
        return;
    }
    out.failed.push(FailedOrder {
        cycle,
        order_id: order.id,
        symbol: order.symbol.clone(),
        reason,
    });
    out.notifications.push(NotificationRequest {
        kind: NotificationKind::OrderFailed,
        message_key: key,
        auto_dismiss: false,
        order_id: Some(order.id),
    });
}

fn stock_price(stocks: &[crate::domain::Stock], symbol: &str) -> Result<f64, SimError> {
    stocks
        .iter()
        .find(|s| s.symbol == symbol)
        .map(|s| s.price)
        .ok_or_else(|| SimError::UnknownSymbol(symbol.to_string()))
}

fn spread_multiplier(env: &PipelineEnv<'_>, symbol: &str) -> Result<f64, SimError> {
    let sector = env
        .stocks
        .iter()
        .find(|s| s.symbol == symbol)
        .map(|s| s.sector)
        .ok_or_else(|| SimError::UnknownSymbol(symbol.to_string()))?;
    let phase_modifier = env.phase.mm_spread_modifier(sector, &env.config.phase);
    Ok(env
        .market_maker
        .spread_multiplier(symbol, phase_modifier, &env.config.market_maker))
}
