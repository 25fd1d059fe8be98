//! Market-maker inventory and spread state.
//!
//! The market maker absorbs the other side of every player execution and
//! quotes both sides of each book. Its net inventory widens the spread it
//! charges: the further it is from flat, the more it wants for taking on
//! more risk. The resulting multiplier is the `spread_multiplier` input of
//! the pricing model.

use crate::config::MarketMakerConfig;
use crate::domain::TradeSide;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketMaker {
    /// Net shares held per symbol; negative when short to the market.
    inventory: BTreeMap<String, i64>,
}

impl MarketMaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inventory(&self, symbol: &str) -> i64 {
        self.inventory.get(symbol).copied().unwrap_or(0)
    }

    /// Record a fill where the market maker was the counterparty.
    /// A taker buy drains inventory; a taker sell builds it.
    pub fn record_fill(&mut self, symbol: &str, taker_side: TradeSide, shares: u32) {
        let delta = match taker_side {
            TradeSide::Buy => -i64::from(shares),
            TradeSide::Sell => i64::from(shares),
        };
        let slot = self.inventory.entry(symbol.to_string()).or_insert(0);
        *slot += delta;
        if *slot == 0 {
            self.inventory.remove(symbol);
        }
    }

    /// Inventory-driven premium on top of the phase spread modifier.
    pub fn inventory_premium(&self, symbol: &str, config: &MarketMakerConfig) -> f64 {
        let skew = self.inventory(symbol).unsigned_abs() as f64;
        (skew * config.inventory_spread_per_share).min(config.max_inventory_premium)
    }

    /// Spread multiplier consumed by the pricing model:
    /// phase modifier × (1 + inventory premium).
    pub fn spread_multiplier(
        &self,
        symbol: &str,
        phase_modifier: f64,
        config: &MarketMakerConfig,
    ) -> f64 {
        phase_modifier * (1.0 + self.inventory_premium(symbol, config))
    }

    /// Two-sided quote prices around a reference price.
    pub fn quote_prices(
        &self,
        symbol: &str,
        reference_price: f64,
        phase_modifier: f64,
        config: &MarketMakerConfig,
    ) -> (f64, f64) {
        let half = config.half_spread * self.spread_multiplier(symbol, phase_modifier, config);
        let bid = reference_price * (1.0 - half);
        let ask = reference_price * (1.0 + half);
        (round_cents(bid), round_cents(ask))
    }
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}
