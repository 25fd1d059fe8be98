//! Stocks, sectors, and per-cycle candles.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// The four sectors every stock belongs to.
///
/// Sector membership drives momentum coupling, phase blending, and the
/// sector indices; there is no "other" bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    Tech,
    Finance,
    Industrial,
    Commodities,
}

impl Sector {
    pub const ALL: [Sector; 4] = [
        Sector::Tech,
        Sector::Finance,
        Sector::Industrial,
        Sector::Commodities,
    ];

    /// Stable index into per-sector arrays.
    pub fn index(self) -> usize {
        match self {
            Sector::Tech => 0,
            Sector::Finance => 1,
            Sector::Industrial => 2,
            Sector::Commodities => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sector::Tech => "tech",
            Sector::Finance => "finance",
            Sector::Industrial => "industrial",
            Sector::Commodities => "commodities",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// OHLC candle for one simulation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub cycle: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// OHLC sanity: high is the top, low is the bottom, prices positive.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
    }
}

/// A synthetic stock: price state plus bounded candle history (newest last).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    pub sector: Sector,
    pub price: f64,
    /// Relative market-cap weight used by the index builder.
    pub market_cap_weight: f64,
    /// Last cycle's close-to-close change, in percent.
    pub change_percent: f64,
    pub candles: VecDeque<Candle>,
}

impl Stock {
    pub fn new(symbol: impl Into<String>, sector: Sector, price: f64, weight: f64) -> Self {
        Self {
            symbol: symbol.into(),
            sector,
            price,
            market_cap_weight: weight,
            change_percent: 0.0,
            candles: VecDeque::new(),
        }
    }

    pub fn latest_candle(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Append a candle, evicting the oldest once `limit` is reached.
    pub fn push_candle(&mut self, candle: Candle, limit: usize) {
        while self.candles.len() >= limit.max(1) {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
    }

    /// Set the price, clamped to the configured floor.
    pub fn set_price(&mut self, price: f64, floor: f64) {
        self.price = price.max(floor);
    }
}
