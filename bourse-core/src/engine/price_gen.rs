//! Per-cycle price and candle generation.
//!
//! Each stock's return is sector drift (momentum influence) plus gaussian
//! noise scaled by the blended phase volatility multiplier. Executed order
//! flow feeds back through [`apply_market_impact`], incrementally moving
//! the same price snapshot later orders execute against.

use crate::config::MarketConfig;
use crate::domain::{Candle, Stock, TradeSide};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Generate this cycle's candle for one stock and move its price.
///
/// The candle opens at the current price (which already carries last
/// cycle's market impact) and closes at the new one; highs and lows extend
/// the body by a volatility-scaled wick.
pub fn generate_candle(
    stock: &mut Stock,
    drift: f64,
    volatility_multiplier: f64,
    config: &MarketConfig,
    rng: &mut StdRng,
    cycle: u64,
) {
    let normal = Normal::new(0.0, 1.0).expect("unit normal is well-formed");
    let sigma = config.base_volatility * volatility_multiplier;
    let noise: f64 = normal.sample(rng) * sigma;

    let open = stock.price;
    let close = (open * (1.0 + drift + noise)).max(config.price_floor);

    let body_top = open.max(close);
    let body_bottom = open.min(close);
    let wick: f64 = rng.gen::<f64>() * sigma;
    let high = body_top * (1.0 + wick);
    let low = (body_bottom * (1.0 - wick)).max(config.price_floor);

    stock.change_percent = if open > 0.0 {
        (close - open) / open * 100.0
    } else {
        0.0
    };
    stock.set_price(close, config.price_floor);
    stock.push_candle(
        Candle {
            cycle,
            open,
            high,
            low,
            close,
        },
        config.candle_history_limit,
    );
}

/// Push the price in the direction of an execution.
///
/// Impact is linear in shares and capped; it lands on the live price (and
/// the current candle's close) so later orders in the same pass trade
/// against the moved market.
pub fn apply_market_impact(stock: &mut Stock, side: TradeSide, shares: u32, config: &MarketConfig) {
    let impact = (f64::from(shares) * config.impact_per_share).min(config.max_impact);
    let factor = match side {
        TradeSide::Buy => 1.0 + impact,
        TradeSide::Sell => 1.0 - impact,
    };
    let moved = (stock.price * factor).max(config.price_floor);
    stock.set_price(moved, config.price_floor);

    if let Some(candle) = stock.candles.back_mut() {
        candle.close = moved;
        candle.high = candle.high.max(moved);
        candle.low = candle.low.min(moved);
    }
}

/// Apply a crash drop to one stock: the sector-wide draw varied ±20%.
///
/// The drop lands inside the current candle (close and low) so the cycle's
/// realized change — and therefore next cycle's momentum — sees the crash.
pub fn apply_crash_impact(
    stock: &mut Stock,
    sector_impact: f64,
    config: &MarketConfig,
    rng: &mut StdRng,
) {
    let variation = rng.gen_range(0.8..1.2);
    let impact = (sector_impact * variation).clamp(0.0, 0.95);
    let dropped = stock.price * (1.0 - impact);
    stock.set_price(dropped, config.price_floor);

    if let Some(candle) = stock.candles.back_mut() {
        candle.close = stock.price;
        candle.low = candle.low.min(stock.price);
        if candle.open > 0.0 {
            stock.change_percent = (candle.close - candle.open) / candle.open * 100.0;
        }
    }
}
