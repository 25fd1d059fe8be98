//! Static configuration profile.
//!
//! Everything tunable lives in `SimConfig`, loaded from TOML by the caller
//! and passed in at construction. Every section has playable defaults, so a
//! profile only needs to override what it cares about. Malformed profiles
//! are a hard error, not something to patch over.

use crate::error::SimError;
use crate::phase::MarketPhase;
use serde::{Deserialize, Serialize};

/// Trading-mechanics parameters for the pricing model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MechanicsConfig {
    /// Full bid/ask spread as a fraction of the base price.
    pub spread_percent: f64,
    /// Per-share progressive slippage coefficient.
    pub slippage_per_share: f64,
    /// Cap on realized per-share slippage, as a fraction of the base price.
    pub max_slippage: f64,
    /// Commission as a fraction of the subtotal.
    pub fee_percent: f64,
    /// Commission floor in cash.
    pub min_fee: f64,
}

impl Default for MechanicsConfig {
    fn default() -> Self {
        Self {
            spread_percent: 0.01,
            slippage_per_share: 0.0001,
            max_slippage: 0.05,
            fee_percent: 0.0025,
            min_fee: 1.0,
        }
    }
}

/// Sector momentum model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Multiplicative decay toward neutral applied each cycle.
    pub decay: f64,
    /// Weight of this cycle's adjusted performance.
    pub update_rate: f64,
    /// Momentum-to-price-drift conversion factor.
    pub influence_strength: f64,
    /// Absolute cap on the per-cycle drift a sector can contribute.
    pub max_influence: f64,
    /// Minimum |performance| before a sector affects its neighbors.
    pub correlation_threshold: f64,
    /// Global scaling knob on all cross-sector effects.
    pub interaction_multiplier: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            decay: 0.9,
            update_rate: 0.3,
            influence_strength: 0.02,
            max_influence: 0.01,
            correlation_threshold: 0.02,
            interaction_multiplier: 1.0,
        }
    }
}

/// Per-phase tuning: duration gate, volatility, spreads, sentiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseParams {
    /// Cycles a phase must last before ordinary transitions may fire.
    pub min_duration: u32,
    pub volatility_multiplier: f64,
    pub spread_modifier: f64,
    /// Fear & Greed base contribution.
    pub base_score: f64,
}

impl Default for PhaseParams {
    fn default() -> Self {
        Self {
            min_duration: 15,
            volatility_multiplier: 1.0,
            spread_modifier: 1.0,
            base_score: 50.0,
        }
    }
}

/// Stochastic transition probabilities per eligible `(from, to)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionProbabilities {
    pub prosperity_to_boom: f64,
    pub prosperity_to_consolidation: f64,
    pub boom_to_prosperity: f64,
    pub boom_to_consolidation: f64,
    pub consolidation_to_prosperity: f64,
    pub panic_to_recession: f64,
    pub recession_to_recovery: f64,
    pub recovery_to_prosperity: f64,
}

impl Default for TransitionProbabilities {
    fn default() -> Self {
        Self {
            prosperity_to_boom: 0.12,
            prosperity_to_consolidation: 0.10,
            boom_to_prosperity: 0.12,
            boom_to_consolidation: 0.15,
            consolidation_to_prosperity: 0.20,
            panic_to_recession: 0.50,
            recession_to_recovery: 0.10,
            recovery_to_prosperity: 0.15,
        }
    }
}

/// Crash mechanics: overheat detection plus escalating crash probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    /// A sector overheats when its index trades this fraction above its
    /// trailing average.
    pub overheat_threshold: f64,
    /// Trailing-average window, in cycles.
    pub overheat_window: usize,
    pub base_probability: f64,
    pub probability_per_cycle: f64,
    /// Crash price impact is drawn uniformly from [min, max].
    pub impact_min: f64,
    pub impact_max: f64,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            overheat_threshold: 0.15,
            overheat_window: 50,
            base_probability: 0.02,
            probability_per_cycle: 0.005,
            impact_min: 0.15,
            impact_max: 0.35,
        }
    }
}

/// Phase engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    pub prosperity: PhaseParams,
    pub boom: PhaseParams,
    pub consolidation: PhaseParams,
    pub panic: PhaseParams,
    pub recession: PhaseParams,
    pub recovery: PhaseParams,
    pub transitions: TransitionProbabilities,
    pub crash: CrashConfig,
}

impl PhaseConfig {
    pub fn params(&self, phase: MarketPhase) -> &PhaseParams {
        match phase {
            MarketPhase::Prosperity => &self.prosperity,
            MarketPhase::Boom => &self.boom,
            MarketPhase::Consolidation => &self.consolidation,
            MarketPhase::Panic => &self.panic,
            MarketPhase::Recession => &self.recession,
            MarketPhase::Recovery => &self.recovery,
        }
    }
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            prosperity: PhaseParams {
                min_duration: 20,
                volatility_multiplier: 1.0,
                spread_modifier: 1.0,
                base_score: 60.0,
            },
            boom: PhaseParams {
                min_duration: 15,
                volatility_multiplier: 1.3,
                spread_modifier: 0.9,
                base_score: 80.0,
            },
            consolidation: PhaseParams {
                min_duration: 10,
                volatility_multiplier: 0.8,
                spread_modifier: 1.1,
                base_score: 45.0,
            },
            panic: PhaseParams {
                min_duration: 8,
                volatility_multiplier: 2.5,
                spread_modifier: 1.8,
                base_score: 5.0,
            },
            recession: PhaseParams {
                min_duration: 25,
                volatility_multiplier: 1.5,
                spread_modifier: 1.4,
                base_score: 20.0,
            },
            recovery: PhaseParams {
                min_duration: 15,
                volatility_multiplier: 1.1,
                spread_modifier: 1.2,
                base_score: 40.0,
            },
            transitions: TransitionProbabilities::default(),
            crash: CrashConfig::default(),
        }
    }
}

/// Margin-loan terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanConfig {
    /// Cap on booked loans plus loans requested by earlier orders in the
    /// same execution pass.
    pub max_concurrent: usize,
    /// Withheld from the principal at disbursement.
    pub origination_fee_percent: f64,
    /// Default per-cycle rate offered to new loan requests.
    pub base_rate: f64,
    pub duration_cycles: u32,
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            origination_fee_percent: 0.01,
            base_rate: 0.0005,
            duration_cycles: 120,
        }
    }
}

/// Short-selling terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortConfig {
    /// Cash locked at placement, as a fraction of the order's notional.
    pub collateral_ratio: f64,
}

impl Default for ShortConfig {
    fn default() -> Self {
        Self {
            collateral_ratio: 0.5,
        }
    }
}

/// Price formation and bookkeeping limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Prices never fall below this.
    pub price_floor: f64,
    /// Per-cycle return standard deviation before phase scaling.
    pub base_volatility: f64,
    /// Relative price move contributed per executed share.
    pub impact_per_share: f64,
    /// Cap on the relative move a single execution can cause.
    pub max_impact: f64,
    pub candle_history_limit: usize,
    pub index_base_value: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            price_floor: 0.01,
            base_volatility: 0.012,
            impact_per_share: 0.00002,
            max_impact: 0.03,
            candle_history_limit: 365,
            index_base_value: 10_000.0,
        }
    }
}

/// Market-maker quoting and inventory parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakerConfig {
    /// Half-spread fraction around the reference price before modifiers.
    pub half_spread: f64,
    pub quote_shares: u32,
    pub quote_ttl: u32,
    /// Extra spread per share of absolute inventory.
    pub inventory_spread_per_share: f64,
    /// Cap on the inventory-driven spread premium.
    pub max_inventory_premium: f64,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            half_spread: 0.004,
            quote_shares: 150,
            quote_ttl: 2,
            inventory_spread_per_share: 0.0005,
            max_inventory_premium: 1.0,
        }
    }
}

/// Background bot order flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Order attempts per symbol per cycle.
    pub orders_per_cycle: u32,
    /// Chance each attempt actually places an order.
    pub order_probability: f64,
    /// Max fractional offset of a bot limit price from the current price.
    pub price_deviation: f64,
    pub min_shares: u32,
    pub max_shares: u32,
    /// Book lifetime of bot entries, in cycles.
    pub entry_ttl: u32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            orders_per_cycle: 3,
            order_probability: 0.6,
            price_deviation: 0.015,
            min_shares: 10,
            max_shares: 120,
            entry_ttl: 3,
        }
    }
}

/// The complete simulation profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub mechanics: MechanicsConfig,
    pub momentum: MomentumConfig,
    pub phase: PhaseConfig,
    pub loan: LoanConfig,
    pub short: ShortConfig,
    pub market: MarketConfig,
    pub market_maker: MarketMakerConfig,
    pub bots: BotConfig,
}

impl SimConfig {
    /// Parse a TOML profile. Partial profiles inherit the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, SimError> {
        Ok(toml::from_str(text)?)
    }
}
