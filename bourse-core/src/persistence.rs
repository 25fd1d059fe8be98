//! Save/load state slices.
//!
//! An external layer serializes these slices verbatim; the engine offers
//! wholesale replacement per slice with no validation beyond shape. A
//! payload that does not deserialize is a hard error — corrupt saves are
//! surfaced, never silently patched.

use crate::book::OrderBook;
use crate::domain::{ClimateEntry, Loan, PendingOrder, Portfolio, ShortPosition, Stock};
use crate::engine::{MarketMaker, MarketSim};
use crate::error::SimError;
use crate::index::MarketIndex;
use crate::momentum::SectorMomentum;
use crate::phase::PhaseEngine;
use crate::rng::SimRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every state slice of a running simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub cycle: u64,
    pub master_seed: u64,
    pub next_order_id: u64,
    pub next_entry_id: u64,
    pub next_timestamp: u64,
    pub stocks: Vec<Stock>,
    pub books: BTreeMap<String, OrderBook>,
    pub pending: Vec<PendingOrder>,
    pub portfolio: Portfolio,
    pub phase: PhaseEngine,
    pub momentum: SectorMomentum,
    pub market_maker: MarketMaker,
    pub index: MarketIndex,
    pub climate: Vec<ClimateEntry>,
}

impl SimSnapshot {
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl MarketSim {
    /// Capture every state slice.
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            cycle: self.cycle,
            master_seed: self.rng.master_seed(),
            next_order_id: self.next_order_id,
            next_entry_id: self.next_entry_id,
            next_timestamp: self.next_timestamp,
            stocks: self.stocks.clone(),
            books: self.books.clone(),
            pending: self.pending.clone(),
            portfolio: self.portfolio.clone(),
            phase: self.phase.clone(),
            momentum: self.momentum.clone(),
            market_maker: self.market_maker.clone(),
            index: self.index.clone(),
            climate: self.climate.clone(),
        }
    }

    /// Replace the whole simulation state.
    pub fn restore(&mut self, snapshot: SimSnapshot) {
        self.cycle = snapshot.cycle;
        self.rng = SimRng::new(snapshot.master_seed);
        self.next_order_id = snapshot.next_order_id;
        self.next_entry_id = snapshot.next_entry_id;
        self.next_timestamp = snapshot.next_timestamp;
        self.stocks = snapshot.stocks;
        self.books = snapshot.books;
        self.pending = snapshot.pending;
        self.portfolio = snapshot.portfolio;
        self.phase = snapshot.phase;
        self.momentum = snapshot.momentum;
        self.market_maker = snapshot.market_maker;
        self.index = snapshot.index;
        self.climate = snapshot.climate;
    }

    // Per-slice replacement, shape-trusted by contract.

    pub fn restore_stocks(&mut self, stocks: Vec<Stock>) {
        self.stocks = stocks;
    }

    pub fn restore_books(&mut self, books: BTreeMap<String, OrderBook>) {
        self.books = books;
    }

    pub fn restore_pending_orders(&mut self, pending: Vec<PendingOrder>) {
        self.pending = pending;
    }

    pub fn restore_loans(&mut self, loans: Vec<Loan>) {
        self.portfolio.loans = loans;
    }

    pub fn restore_short_positions(&mut self, shorts: BTreeMap<String, ShortPosition>) {
        self.portfolio.shorts = shorts;
    }

    pub fn restore_portfolio(&mut self, portfolio: Portfolio) {
        self.portfolio = portfolio;
    }

    pub fn restore_phase(&mut self, phase: PhaseEngine) {
        self.phase = phase;
    }

    pub fn restore_momentum(&mut self, momentum: SectorMomentum) {
        self.momentum = momentum;
    }

    pub fn restore_market_maker(&mut self, market_maker: MarketMaker) {
        self.market_maker = market_maker;
    }

    pub fn restore_climate(&mut self, climate: Vec<ClimateEntry>) {
        self.climate = climate;
    }
}
