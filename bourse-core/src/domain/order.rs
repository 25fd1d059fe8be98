//! Pending orders: the player's instructions awaiting execution.

use super::ids::OrderId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cash-flow direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// What the order does to the portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderAction {
    Buy,
    Sell,
    ShortSell,
    BuyToCover,
}

impl OrderAction {
    /// Buy-to-cover pays cash like a buy; a short sale receives cash like a sell.
    pub fn side(self) -> TradeSide {
        match self {
            OrderAction::Buy | OrderAction::BuyToCover => TradeSide::Buy,
            OrderAction::Sell | OrderAction::ShortSell => TradeSide::Sell,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderAction::Buy => "buy",
            OrderAction::Sell => "sell",
            OrderAction::ShortSell => "short-sell",
            OrderAction::BuyToCover => "buy-to-cover",
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trigger discipline of a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Executes unconditionally once its delay has elapsed.
    Market,
    /// Executes at or better than the limit price.
    Limit { limit: f64 },
    /// Arms at the stop price, then executes as a market order.
    Stop { stop: f64 },
    /// Arms at the stop price (sticky), then gated like a limit order.
    StopLimit { stop: f64, limit: f64 },
}

impl OrderKind {
    pub fn is_market(&self) -> bool {
        matches!(self, OrderKind::Market)
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::Limit { .. } => "limit",
            OrderKind::Stop { .. } => "stop",
            OrderKind::StopLimit { .. } => "stop-limit",
        }
    }
}

/// Margin loan attached to a buy-side order.
///
/// Nothing is disbursed at placement; the principal is recomputed against the
/// actual fill price at execution time and paid out net of the origination fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    /// Maximum gross principal the trader is willing to borrow.
    pub amount: f64,
    /// Per-cycle interest rate locked at placement.
    pub rate: f64,
    pub duration_cycles: u32,
}

/// A player's order waiting in the execution pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: OrderId,
    pub symbol: String,
    pub action: OrderAction,
    pub shares: u32,
    pub kind: OrderKind,
    /// Stock price at placement, kept for reporting.
    pub reference_price: f64,
    /// Validity window in cycles; market orders execute when this reaches 1.
    pub remaining_cycles: u32,
    /// Sticky flag: a stop-limit stop only has to trigger once.
    pub stop_triggered: bool,
    /// The creation cycle never counts toward execution or expiry.
    pub is_new: bool,
    pub loan_request: Option<LoanRequest>,
    /// Cash locked at placement to collateralize a short sale.
    pub locked_collateral: Option<f64>,
}

impl PendingOrder {
    /// Whether the expiry pass should lapse this order next tick.
    pub fn expires_this_cycle(&self) -> bool {
        !self.is_new && self.remaining_cycles == 1 && !self.kind.is_market()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_sides() {
        assert_eq!(OrderAction::Buy.side(), TradeSide::Buy);
        assert_eq!(OrderAction::BuyToCover.side(), TradeSide::Buy);
        assert_eq!(OrderAction::Sell.side(), TradeSide::Sell);
        assert_eq!(OrderAction::ShortSell.side(), TradeSide::Sell);
    }

    #[test]
    fn market_orders_never_expire() {
        let order = PendingOrder {
            id: OrderId(1),
            symbol: "ACME".into(),
            action: OrderAction::Buy,
            shares: 10,
            kind: OrderKind::Market,
            reference_price: 100.0,
            remaining_cycles: 1,
            stop_triggered: false,
            is_new: false,
            loan_request: None,
            locked_collateral: None,
        };
        assert!(!order.expires_this_cycle());

        let limit = PendingOrder {
            kind: OrderKind::Limit { limit: 90.0 },
            ..order.clone()
        };
        assert!(limit.expires_this_cycle());

        let fresh = PendingOrder {
            is_new: true,
            ..limit.clone()
        };
        assert!(!fresh.expires_this_cycle());
    }
}
