//! Market index builder.
//!
//! Aggregates per-stock candles into a composite index and one index per
//! sector, weighted by market cap. The first aggregated close pins the
//! series base: it maps to the configured base value (10 000 by default)
//! and every later candle is scaled by the same factor, so index levels are
//! comparable across runs regardless of absolute price levels.

use crate::domain::{Sector, Stock};
use serde::{Deserialize, Serialize};

/// One aggregated index candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexCandle {
    pub cycle: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Close-to-close delta in index points.
    pub change: f64,
    pub change_percent: f64,
}

/// A single index series (composite or sector).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSeries {
    /// Weighted close of the first cycle; the normalization anchor.
    base_close: Option<f64>,
    candles: Vec<IndexCandle>,
}

impl IndexSeries {
    pub fn candles(&self) -> &[IndexCandle] {
        &self.candles
    }

    pub fn latest(&self) -> Option<&IndexCandle> {
        self.candles.last()
    }

    /// Aggregate one cycle of `(weight, candle)` components.
    fn update(&mut self, components: &[(f64, &crate::domain::Candle)], base_value: f64, cycle: u64) {
        let total_weight: f64 = components.iter().map(|(w, _)| *w).sum();
        if total_weight <= 0.0 || components.is_empty() {
            return;
        }

        let weighted = |pick: fn(&crate::domain::Candle) -> f64| -> f64 {
            components
                .iter()
                .map(|(w, c)| *w * pick(c))
                .sum::<f64>()
                / total_weight
        };

        let raw_close = weighted(|c| c.close);
        let base = *self.base_close.get_or_insert(raw_close);
        let scale = base_value / base;

        let close = raw_close * scale;
        let previous_close = self.latest().map(|c| c.close);
        let (change, change_percent) = match previous_close {
            Some(previous) if previous != 0.0 => {
                (close - previous, (close - previous) / previous * 100.0)
            }
            _ => (0.0, 0.0),
        };

        self.candles.push(IndexCandle {
            cycle,
            open: weighted(|c| c.open) * scale,
            high: weighted(|c| c.high) * scale,
            low: weighted(|c| c.low) * scale,
            close,
            change,
            change_percent,
        });
    }
}

/// Composite plus per-sector index series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketIndex {
    pub composite: IndexSeries,
    pub sectors: [IndexSeries; 4],
}

impl MarketIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sector(&self, sector: Sector) -> &IndexSeries {
        &self.sectors[sector.index()]
    }

    /// Fold this cycle's stock candles into all series.
    pub fn update(&mut self, stocks: &[Stock], base_value: f64, cycle: u64) {
        let components: Vec<(Sector, f64, &crate::domain::Candle)> = stocks
            .iter()
            .filter_map(|stock| {
                stock
                    .latest_candle()
                    .filter(|candle| candle.cycle == cycle)
                    .map(|candle| (stock.sector, stock.market_cap_weight, candle))
            })
            .collect();

        let all: Vec<(f64, &crate::domain::Candle)> =
            components.iter().map(|(_, w, c)| (*w, *c)).collect();
        self.composite.update(&all, base_value, cycle);

        for sector in Sector::ALL {
            let members: Vec<(f64, &crate::domain::Candle)> = components
                .iter()
                .filter(|(s, _, _)| *s == sector)
                .map(|(_, w, c)| (*w, *c))
                .collect();
            self.sectors[sector.index()].update(&members, base_value, cycle);
        }
    }
}
