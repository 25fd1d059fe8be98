//! Typed events emitted by the engine for the presentation layer.
//!
//! The core never reads any of these back; they are pure sinks consumed by
//! whatever renders the game.

use super::ids::{OrderId, TraderId};
use super::order::OrderAction;
use super::stock::Sector;
use crate::error::FailureReason;
use crate::phase::MarketPhase;
use serde::{Deserialize, Serialize};

/// A completed execution of (part of) a player order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub cycle: u64,
    pub order_id: Option<OrderId>,
    pub symbol: String,
    pub action: OrderAction,
    pub shares: u32,
    /// Effective per-share price after spread and slippage.
    pub price: f64,
    pub fee: f64,
    /// Cash delta magnitude: paid for buys, received for sells.
    pub total: f64,
}

/// A player order that could not execute (or lapsed), with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedOrder {
    pub cycle: u64,
    pub order_id: OrderId,
    pub symbol: String,
    pub reason: FailureReason,
}

/// Category of an outbound notification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    OrderFailed,
    OrderExpired,
    MarketCrash,
    PhaseChange,
    LoanRepaid,
}

/// Request for the presentation layer to show a notification.
///
/// `message_key` is a stable identifier the UI localizes; `order_id` lets
/// the UI offer edit/retry on the offending order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub message_key: String,
    pub auto_dismiss: bool,
    pub order_id: Option<OrderId>,
}

/// Dedup predicate supplied by the caller: whether a notification with this
/// message key is already being shown. Keeps failure alerts idempotent while
/// an order stays pending across cycles.
pub trait NotificationLedger {
    fn exists(&self, message_key: &str) -> bool;
}

/// Ledger that knows of no notifications; every alert is fresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotifications;

impl NotificationLedger for NoNotifications {
    fn exists(&self, _message_key: &str) -> bool {
        false
    }
}

/// One append-only market-climate sample per cycle, for charting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateEntry {
    pub cycle: u64,
    pub phase: MarketPhase,
    pub fear_greed: f64,
}

/// Scope of a phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseScope {
    Global,
    Sector(Sector),
}

/// A phase transition that happened this cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhaseChange {
    pub scope: PhaseScope,
    pub from: MarketPhase,
    pub to: MarketPhase,
}

/// A trade between two book participants (bot flow or player book fills).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub buyer: TraderId,
    pub seller: TraderId,
    pub shares: u32,
    pub price: f64,
    pub cycle: u64,
}

/// Everything one cycle produced, for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub trades: Vec<TradeRecord>,
    pub failed: Vec<FailedOrder>,
    pub notifications: Vec<NotificationRequest>,
    pub phase_changes: Vec<PhaseChange>,
    pub crashes: Vec<Sector>,
    pub book_trades: Vec<Trade>,
    pub climate: ClimateEntry,
}
