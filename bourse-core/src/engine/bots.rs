//! Background bot order flow.
//!
//! Bots are scenery: numbered noise traders that place limit orders around
//! the current price each cycle. Their entries expire out of the book after
//! a few cycles, their trades move prices through the normal impact path,
//! and their cash is not tracked — only the player has a portfolio.

use crate::config::BotConfig;
use crate::domain::{BookSide, Sector, Stock};
use rand::rngs::StdRng;
use rand::Rng;

/// A bot order before it gets an entry id and timestamp.
#[derive(Debug, Clone)]
pub struct BotOrder {
    pub bot: u32,
    pub side: BookSide,
    pub price: f64,
    pub shares: u32,
}

/// Roll this cycle's noise orders for one stock.
pub fn generate_orders(stock: &Stock, config: &BotConfig, rng: &mut StdRng) -> Vec<BotOrder> {
    let mut orders = Vec::new();
    for _ in 0..config.orders_per_cycle {
        if rng.gen::<f64>() >= config.order_probability {
            continue;
        }
        let side = if rng.gen_bool(0.5) {
            BookSide::Bid
        } else {
            BookSide::Ask
        };
        // Offset biased toward the passive side of the price so most orders
        // rest, while some cross and trade immediately.
        let offset = rng.gen_range(-config.price_deviation..config.price_deviation);
        let price = round_cents(stock.price * (1.0 + offset));
        if price <= 0.0 {
            continue;
        }
        let shares = rng.gen_range(config.min_shares..=config.max_shares.max(config.min_shares));
        orders.push(BotOrder {
            bot: bot_number(stock.sector, rng),
            side,
            price,
            shares,
        });
    }
    orders
}

/// Bots are drawn from a small per-sector population so self-trades can
/// actually occur (and must be skipped by the matcher).
fn bot_number(sector: Sector, rng: &mut StdRng) -> u32 {
    sector.index() as u32 * 8 + rng.gen_range(0..8)
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}
