//! Trade pricing model.
//!
//! A pure function from (base price, size, side, mechanics, spread
//! multiplier) to the executed price and cash totals. No state, no I/O;
//! every execution path in the pipeline routes through here so costs are
//! computed exactly one way.

use crate::config::MechanicsConfig;
use crate::domain::TradeSide;
use serde::{Deserialize, Serialize};

/// Component costs behind an execution, for display and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub base_price: f64,
    /// Half-spread cost per share, after the external multiplier.
    pub spread_cost: f64,
    /// Realized per-share slippage (average of the progressive increments).
    pub slippage: f64,
    pub fee: f64,
}

/// A priced execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Per-share price after spread and slippage, worsened in the trade
    /// direction.
    pub effective_price: f64,
    /// `effective_price × shares`.
    pub subtotal: f64,
    pub fee: f64,
    /// Cash the trader pays (buy) or receives (sell).
    pub total: f64,
    pub breakdown: CostBreakdown,
}

/// Realized per-share slippage for an order of `shares`.
///
/// The i-th share (0-indexed) slips `base_price × slippage_per_share × i`;
/// the realized value is the average of those increments, capped at
/// `base_price × max_slippage`.
pub fn progressive_slippage(mechanics: &MechanicsConfig, base_price: f64, shares: u32) -> f64 {
    if shares == 0 {
        return 0.0;
    }
    let average_step = f64::from(shares - 1) / 2.0;
    let raw = base_price * mechanics.slippage_per_share * average_step;
    raw.min(base_price * mechanics.max_slippage)
}

/// Price an execution of `shares` at `base_price`.
///
/// `spread_multiplier` is supplied by the caller (market-maker inventory ×
/// phase spread modifier); 1.0 means the configured spread unchanged.
pub fn execute(
    mechanics: &MechanicsConfig,
    base_price: f64,
    shares: u32,
    side: TradeSide,
    spread_multiplier: f64,
) -> Execution {
    let spread_cost = base_price * (mechanics.spread_percent / 2.0) * spread_multiplier;
    let slippage = progressive_slippage(mechanics, base_price, shares);

    let effective_price = match side {
        TradeSide::Buy => base_price + spread_cost + slippage,
        TradeSide::Sell => (base_price - spread_cost - slippage).max(0.0),
    };

    let subtotal = effective_price * f64::from(shares);
    let fee = (subtotal * mechanics.fee_percent).max(mechanics.min_fee);
    let total = match side {
        TradeSide::Buy => subtotal + fee,
        TradeSide::Sell => subtotal - fee,
    };

    Execution {
        effective_price,
        subtotal,
        fee,
        total,
        breakdown: CostBreakdown {
            base_price,
            spread_cost,
            slippage,
            fee,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mechanics(spread: f64, slip: f64, fee: f64, min_fee: f64) -> MechanicsConfig {
        MechanicsConfig {
            spread_percent: spread,
            slippage_per_share: slip,
            max_slippage: 0.05,
            fee_percent: fee,
            min_fee,
        }
    }

    #[test]
    fn buy_then_sell_is_asymmetric() {
        // 1% spread, no fees: a round trip at an unchanged base price loses money.
        let m = mechanics(0.01, 0.0001, 0.0, 0.0);
        let buy = execute(&m, 100.0, 50, TradeSide::Buy, 1.0);
        let sell = execute(&m, 100.0, 50, TradeSide::Sell, 1.0);
        assert!(sell.total < buy.total);
    }

    #[test]
    fn spread_scales_with_multiplier() {
        let m = mechanics(0.01, 0.0, 0.0, 0.0);
        let calm = execute(&m, 100.0, 10, TradeSide::Buy, 1.0);
        let stressed = execute(&m, 100.0, 10, TradeSide::Buy, 2.0);
        assert!((calm.breakdown.spread_cost - 0.5).abs() < 1e-12);
        assert!((stressed.breakdown.spread_cost - 1.0).abs() < 1e-12);
    }

    #[test]
    fn slippage_is_monotone_and_capped() {
        let m = mechanics(0.0, 0.001, 0.0, 0.0);
        let mut previous = 0.0;
        for shares in 1..=200 {
            let slip = progressive_slippage(&m, 100.0, shares);
            assert!(slip >= previous, "slippage must not decrease with size");
            assert!(slip <= 100.0 * m.max_slippage + 1e-12);
            previous = slip;
        }
        // Deep in the cap region the value saturates.
        assert_eq!(progressive_slippage(&m, 100.0, 150), 100.0 * 0.05);
    }

    #[test]
    fn slippage_averages_the_progressive_increments() {
        let m = mechanics(0.0, 0.001, 0.0, 0.0);
        // Shares 0..4 slip 0, 0.1, 0.2, 0.3, 0.4 → average 0.2.
        let slip = progressive_slippage(&m, 100.0, 5);
        assert!((slip - 0.2).abs() < 1e-12);
    }

    #[test]
    fn single_share_has_no_slippage() {
        let m = mechanics(0.0, 0.001, 0.0, 0.0);
        assert_eq!(progressive_slippage(&m, 100.0, 1), 0.0);
        assert_eq!(progressive_slippage(&m, 100.0, 0), 0.0);
    }

    #[test]
    fn fee_floor_applies() {
        let m = mechanics(0.0, 0.0, 0.0025, 1.0);
        let small = execute(&m, 10.0, 1, TradeSide::Buy, 1.0);
        assert_eq!(small.fee, 1.0); // 10 × 0.0025 = 0.025 < 1.0 floor
        let large = execute(&m, 100.0, 100, TradeSide::Buy, 1.0);
        assert!((large.fee - 25.0).abs() < 1e-9);
    }

    #[test]
    fn totals_add_fee_on_buy_and_subtract_on_sell() {
        let m = mechanics(0.0, 0.0, 0.01, 0.0);
        let buy = execute(&m, 100.0, 10, TradeSide::Buy, 1.0);
        assert!((buy.total - (1000.0 + 10.0)).abs() < 1e-9);
        let sell = execute(&m, 100.0, 10, TradeSide::Sell, 1.0);
        assert!((sell.total - (1000.0 - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn sell_price_never_goes_negative() {
        let m = mechanics(3.0, 0.0, 0.0, 0.0); // absurd spread
        let sell = execute(&m, 1.0, 1, TradeSide::Sell, 1.0);
        assert!(sell.effective_price >= 0.0);
    }
}
