//! Error taxonomy.
//!
//! Two tiers. `FailureReason` values ride on failed-order records: they are
//! recoverable by design (the order usually stays pending for retry) and are
//! never panics. `SimError` covers genuinely fatal conditions — unknown
//! symbols, corrupt snapshots, malformed configuration — which surface as
//! hard errors instead of being silently absorbed.

use crate::domain::{OrderId, OrderKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a non-market pending order lapsed unexecuted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExpiryReason {
    #[error("limit price was never reached")]
    LimitNeverReached,
    #[error("stop price was never triggered")]
    StopNeverTriggered,
    #[error("stop triggered, but the limit price was never reached")]
    StopTriggeredLimitNeverReached,
}

impl ExpiryReason {
    /// The lapse reason for an order of the given kind.
    pub fn for_kind(kind: &OrderKind, stop_triggered: bool) -> ExpiryReason {
        match kind {
            OrderKind::Limit { .. } => ExpiryReason::LimitNeverReached,
            OrderKind::Stop { .. } => ExpiryReason::StopNeverTriggered,
            OrderKind::StopLimit { .. } if stop_triggered => {
                ExpiryReason::StopTriggeredLimitNeverReached
            }
            OrderKind::StopLimit { .. } => ExpiryReason::StopNeverTriggered,
            // Market orders never expire; callers must not ask.
            OrderKind::Market => ExpiryReason::LimitNeverReached,
        }
    }
}

/// Recoverable execution failure attached to a failed-order record.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum FailureReason {
    #[error("insufficient funds: required {required:.2}, available {available:.2}")]
    InsufficientFunds {
        required: f64,
        available: f64,
        /// Distinguished sub-case: the concurrent-loan cap, not the cash
        /// balance, blocked the order. The remedy is waiting for a slot.
        loan_limit_reached: bool,
    },

    #[error("insufficient shares: required {required}, available {available}")]
    InsufficientShares { required: u32, available: u32 },

    #[error("order expired: {reason}")]
    Expired { reason: ExpiryReason },
}

impl FailureReason {
    /// Message key consumed by the presentation layer and by the
    /// notification-existence predicate for deduplication.
    pub fn message_key(&self, order: OrderId) -> String {
        let stem = match self {
            FailureReason::InsufficientFunds {
                loan_limit_reached: true,
                ..
            } => "order.failed.loan_limit",
            FailureReason::InsufficientFunds { .. } => "order.failed.insufficient_funds",
            FailureReason::InsufficientShares { .. } => "order.failed.insufficient_shares",
            FailureReason::Expired { .. } => "order.expired",
        };
        format!("{stem}.{order}")
    }
}

/// Fatal engine errors.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown symbol {0:?}")]
    UnknownSymbol(String),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("order shares must be positive")]
    ZeroShares,

    #[error("cannot lock {required:.2} collateral, only {available:.2} cash available")]
    InsufficientCollateral { required: f64, available: f64 },

    #[error("invalid split ratio {0} (must be at least 2)")]
    InvalidSplitRatio(u32),

    #[error("configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}
