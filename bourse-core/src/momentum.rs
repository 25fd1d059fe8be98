//! Sector momentum model.
//!
//! Each sector carries a momentum scalar in [-1, 1] that decays toward
//! neutral and absorbs realized performance every cycle. A fixed,
//! deliberately asymmetric correlation matrix propagates strong moves
//! across sectors — the only channel by which one sector's performance
//! reaches another's price drift.

use crate::config::MomentumConfig;
use crate::domain::{Sector, Stock};
use serde::{Deserialize, Serialize};

/// Inter-sector correlation, `CORRELATION[from][to]`, sector order
/// Tech, Finance, Industrial, Commodities.
///
/// Asymmetric on purpose: finance rallies lift tech harder than tech lifts
/// finance, and commodities spikes *hurt* industrials (input costs) while
/// industrial demand lifts commodities.
pub const CORRELATION: [[f64; 4]; 4] = [
    //            tech  finance  industrial  commodities
    /* tech */ [0.0, 0.3, 0.2, 0.1],
    /* finance */ [0.4, 0.0, 0.25, 0.15],
    /* industrial */ [0.15, 0.2, 0.0, 0.5],
    /* commodities */ [-0.1, 0.1, -0.4, 0.0],
];

/// Per-sector momentum state. Persists across cycles; decayed, never reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectorMomentum {
    momentum: [f64; 4],
    last_performance: [f64; 4],
}

impl SectorMomentum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn momentum(&self, sector: Sector) -> f64 {
        self.momentum[sector.index()]
    }

    /// Threshold-adjusted performance recorded in the last update.
    pub fn last_performance(&self, sector: Sector) -> f64 {
        self.last_performance[sector.index()]
    }

    /// Mean momentum across the four sectors.
    pub fn average(&self) -> f64 {
        self.momentum.iter().sum::<f64>() / 4.0
    }

    /// The drift contribution exposed to price formation — everything else
    /// in this model stays internal.
    pub fn influence(&self, sector: Sector, config: &MomentumConfig) -> f64 {
        let raw = self.momentum[sector.index()] * config.influence_strength;
        raw.clamp(-config.max_influence, config.max_influence)
    }

    /// Absorb this cycle's realized performance.
    pub fn update(&mut self, stocks: &[Stock], config: &MomentumConfig) {
        let performance = realized_performance(stocks);

        // Cross-sector effects only flow from sectors that moved hard enough.
        let mut adjusted = performance;
        for from in Sector::ALL {
            let perf = performance[from.index()];
            if perf.abs() <= config.correlation_threshold {
                continue;
            }
            for to in Sector::ALL {
                if from == to {
                    continue;
                }
                adjusted[to.index()] +=
                    perf * CORRELATION[from.index()][to.index()] * 0.5 * config.interaction_multiplier;
            }
        }

        for sector in Sector::ALL {
            let i = sector.index();
            self.last_performance[i] = adjusted[i];
            self.momentum[i] =
                (self.momentum[i] * config.decay + adjusted[i] * config.update_rate).clamp(-1.0, 1.0);
        }
    }
}

/// Mean `change_percent / 100` per sector; sectors without stocks read 0.
fn realized_performance(stocks: &[Stock]) -> [f64; 4] {
    let mut sums = [0.0f64; 4];
    let mut counts = [0u32; 4];
    for stock in stocks {
        sums[stock.sector.index()] += stock.change_percent / 100.0;
        counts[stock.sector.index()] += 1;
    }
    let mut performance = [0.0f64; 4];
    for i in 0..4 {
        if counts[i] > 0 {
            performance[i] = sums[i] / f64::from(counts[i]);
        }
    }
    performance
}
