//! Bourse Core — single-player market simulation engine.
//!
//! The heart of the game:
//! - Domain types (stocks, candles, orders, book entries, portfolio)
//! - Market phase state machine with crashes and Fear & Greed
//! - Sector momentum model with asymmetric cross-sector correlation
//! - Per-symbol order books with price-time priority and a pure matcher
//! - Pending-order execution pipeline (triggers, loans, partial covers)
//! - Market-cap-weighted composite and sector indices
//! - Cycle driver (`MarketSim`) tying one deterministic pass together
//!
//! Everything is cycle-counted and single-threaded; given the same config,
//! seed, and order script, a run replays exactly.

pub mod book;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod index;
pub mod momentum;
pub mod persistence;
pub mod phase;
mod pipeline;
pub mod pricing;
pub mod rng;

pub use engine::{default_roster, MarketSim, OrderDraft};
