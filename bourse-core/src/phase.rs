//! Market phase engine.
//!
//! Six phases, one state machine per sector. The global phase is never
//! driven directly: it is always the rounded average of the four sector
//! scores, recomputed after every change. Ordinary transitions need a
//! minimum dwell time, a momentum predicate, and a stochastic roll; panic
//! is reachable only through the crash mechanism.

use crate::config::PhaseConfig;
use crate::domain::events::{PhaseChange, PhaseScope};
use crate::domain::Sector;
use crate::momentum::SectorMomentum;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Global or sector market phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketPhase {
    Panic,
    Recession,
    Consolidation,
    Recovery,
    Prosperity,
    Boom,
}

impl MarketPhase {
    pub const ALL: [MarketPhase; 6] = [
        MarketPhase::Panic,
        MarketPhase::Recession,
        MarketPhase::Consolidation,
        MarketPhase::Recovery,
        MarketPhase::Prosperity,
        MarketPhase::Boom,
    ];

    /// Sentiment score used to derive the global phase.
    pub fn score(self) -> u8 {
        match self {
            MarketPhase::Panic => 0,
            MarketPhase::Recession => 1,
            MarketPhase::Consolidation => 2,
            MarketPhase::Recovery => 3,
            MarketPhase::Prosperity => 4,
            MarketPhase::Boom => 5,
        }
    }

    /// Inverse of `score` for a rounded average.
    pub fn from_score(score: f64) -> MarketPhase {
        match score.round().clamp(0.0, 5.0) as u8 {
            0 => MarketPhase::Panic,
            1 => MarketPhase::Recession,
            2 => MarketPhase::Consolidation,
            3 => MarketPhase::Recovery,
            4 => MarketPhase::Prosperity,
            _ => MarketPhase::Boom,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MarketPhase::Panic => "panic",
            MarketPhase::Recession => "recession",
            MarketPhase::Consolidation => "consolidation",
            MarketPhase::Recovery => "recovery",
            MarketPhase::Prosperity => "prosperity",
            MarketPhase::Boom => "boom",
        }
    }
}

impl fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A phase plus how long it has held.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhaseState {
    pub phase: MarketPhase,
    pub cycles_in_phase: u32,
}

impl PhaseState {
    fn new(phase: MarketPhase) -> Self {
        Self {
            phase,
            cycles_in_phase: 0,
        }
    }
}

/// Result of the per-cycle crash roll.
#[derive(Debug, Clone, Default)]
pub struct CrashOutcome {
    pub crashed: Vec<Sector>,
    pub changes: Vec<PhaseChange>,
}

/// The phase state machine: four sector instances plus the derived globe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseEngine {
    global: PhaseState,
    sectors: [PhaseState; 4],
    overheat_cycles: [u32; 4],
    /// Trailing sector-index closes feeding overheat detection.
    index_trail: [VecDeque<f64>; 4],
}

impl Default for PhaseEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseEngine {
    pub fn new() -> Self {
        Self {
            global: PhaseState::new(MarketPhase::Prosperity),
            sectors: [PhaseState::new(MarketPhase::Prosperity); 4],
            overheat_cycles: [0; 4],
            index_trail: Default::default(),
        }
    }

    pub fn global_phase(&self) -> MarketPhase {
        self.global.phase
    }

    pub fn global_state(&self) -> PhaseState {
        self.global
    }

    pub fn sector_phase(&self, sector: Sector) -> MarketPhase {
        self.sectors[sector.index()].phase
    }

    pub fn sector_state(&self, sector: Sector) -> PhaseState {
        self.sectors[sector.index()]
    }

    /// Record a sector-index close for the overheat trail.
    pub fn record_index_close(&mut self, sector: Sector, close: f64, window: usize) {
        let trail = &mut self.index_trail[sector.index()];
        while trail.len() >= window.max(1) {
            trail.pop_front();
        }
        trail.push_back(close);
    }

    /// One cycle of ordinary transitions, then global re-derivation.
    pub fn advance(
        &mut self,
        momentum: &SectorMomentum,
        config: &PhaseConfig,
        rng: &mut StdRng,
    ) -> Vec<PhaseChange> {
        let mut changes = Vec::new();

        for sector in Sector::ALL {
            let state = &mut self.sectors[sector.index()];
            state.cycles_in_phase += 1;
            if state.cycles_in_phase < config.params(state.phase).min_duration {
                continue;
            }

            let from = state.phase;
            let m = momentum.momentum(sector);
            for to in transition_candidates(from) {
                if momentum_allows(from, *to, m)
                    && rng.gen::<f64>() < transition_probability(config, from, *to)
                {
                    *state = PhaseState::new(*to);
                    changes.push(PhaseChange {
                        scope: PhaseScope::Sector(sector),
                        from,
                        to: *to,
                    });
                    break;
                }
            }
        }

        self.global.cycles_in_phase += 1;
        if let Some(change) = self.rederive_global() {
            changes.push(change);
        }
        changes
    }

    /// Overheat bookkeeping and the independent crash roll.
    ///
    /// A crash forces the sector into panic and resets its overheat count;
    /// the global phase follows through score derivation, never directly.
    pub fn roll_crashes(&mut self, config: &PhaseConfig, rng: &mut StdRng) -> CrashOutcome {
        let crash = &config.crash;
        let mut outcome = CrashOutcome::default();

        for sector in Sector::ALL {
            let i = sector.index();
            if !self.is_overheated(sector, crash.overheat_threshold) {
                self.overheat_cycles[i] = 0;
                continue;
            }
            self.overheat_cycles[i] += 1;

            let probability = crash.base_probability
                + f64::from(self.overheat_cycles[i]) * crash.probability_per_cycle;
            if rng.gen::<f64>() >= probability {
                continue;
            }

            self.overheat_cycles[i] = 0;
            let from = self.sectors[i].phase;
            self.sectors[i] = PhaseState::new(MarketPhase::Panic);
            if from != MarketPhase::Panic {
                outcome.changes.push(PhaseChange {
                    scope: PhaseScope::Sector(sector),
                    from,
                    to: MarketPhase::Panic,
                });
            }
            outcome.crashed.push(sector);
        }

        if !outcome.crashed.is_empty() {
            if let Some(change) = self.rederive_global() {
                outcome.changes.push(change);
            }
        }
        outcome
    }

    /// Whether a sector's index trades above its trailing average by the
    /// configured margin. Needs a minimally filled trail to mean anything.
    fn is_overheated(&self, sector: Sector, threshold: f64) -> bool {
        let trail = &self.index_trail[sector.index()];
        if trail.len() < 10 {
            return false;
        }
        let average = trail.iter().sum::<f64>() / trail.len() as f64;
        match trail.back() {
            Some(latest) => *latest >= average * (1.0 + threshold),
            None => false,
        }
    }

    fn rederive_global(&mut self) -> Option<PhaseChange> {
        let average = self
            .sectors
            .iter()
            .map(|s| f64::from(s.phase.score()))
            .sum::<f64>()
            / 4.0;
        let derived = MarketPhase::from_score(average);
        if derived == self.global.phase {
            return None;
        }
        let from = self.global.phase;
        self.global = PhaseState::new(derived);
        Some(PhaseChange {
            scope: PhaseScope::Global,
            from,
            to: derived,
        })
    }

    /// Blended volatility multiplier: 40% global phase, 60% sector phase.
    pub fn volatility_multiplier(&self, sector: Sector, config: &PhaseConfig) -> f64 {
        0.4 * config.params(self.global.phase).volatility_multiplier
            + 0.6 * config.params(self.sector_phase(sector)).volatility_multiplier
    }

    /// Market-maker spread modifier: plain average of global and sector.
    pub fn mm_spread_modifier(&self, sector: Sector, config: &PhaseConfig) -> f64 {
        (config.params(self.global.phase).spread_modifier
            + config.params(self.sector_phase(sector)).spread_modifier)
            / 2.0
    }

    /// Fear & Greed composite in [0, 100].
    pub fn fear_greed(
        &self,
        momentum_average: f64,
        avg_price_change: f64,
        normalized_volatility: f64,
        config: &PhaseConfig,
    ) -> f64 {
        let base = config.params(self.global.phase).base_score;
        let volatility_score = 10.0 - normalized_volatility * 400.0;
        (base + momentum_average * 25.0 + volatility_score + avg_price_change * 100.0)
            .clamp(0.0, 100.0)
    }
}

/// Ordinary transition topology. Panic appears as a source only: it is
/// entered exclusively through crashes.
fn transition_candidates(from: MarketPhase) -> &'static [MarketPhase] {
    match from {
        MarketPhase::Prosperity => &[MarketPhase::Boom, MarketPhase::Consolidation],
        MarketPhase::Boom => &[MarketPhase::Consolidation, MarketPhase::Prosperity],
        MarketPhase::Consolidation => &[MarketPhase::Prosperity],
        MarketPhase::Panic => &[MarketPhase::Recession],
        MarketPhase::Recession => &[MarketPhase::Recovery],
        MarketPhase::Recovery => &[MarketPhase::Prosperity],
    }
}

/// Momentum eligibility per `(from, to)` pair.
fn momentum_allows(from: MarketPhase, to: MarketPhase, momentum: f64) -> bool {
    match (from, to) {
        (MarketPhase::Prosperity, MarketPhase::Boom) => momentum >= 0.3,
        (MarketPhase::Prosperity, MarketPhase::Consolidation) => momentum <= -0.1,
        (MarketPhase::Boom, MarketPhase::Consolidation) => momentum <= 0.0,
        (MarketPhase::Boom, MarketPhase::Prosperity) => momentum < 0.25,
        (MarketPhase::Consolidation, MarketPhase::Prosperity) => momentum >= 0.0,
        (MarketPhase::Panic, MarketPhase::Recession) => true,
        (MarketPhase::Recession, MarketPhase::Recovery) => momentum >= -0.1,
        (MarketPhase::Recovery, MarketPhase::Prosperity) => momentum >= 0.05,
        _ => false,
    }
}

fn transition_probability(config: &PhaseConfig, from: MarketPhase, to: MarketPhase) -> f64 {
    let t = &config.transitions;
    match (from, to) {
        (MarketPhase::Prosperity, MarketPhase::Boom) => t.prosperity_to_boom,
        (MarketPhase::Prosperity, MarketPhase::Consolidation) => t.prosperity_to_consolidation,
        (MarketPhase::Boom, MarketPhase::Prosperity) => t.boom_to_prosperity,
        (MarketPhase::Boom, MarketPhase::Consolidation) => t.boom_to_consolidation,
        (MarketPhase::Consolidation, MarketPhase::Prosperity) => t.consolidation_to_prosperity,
        (MarketPhase::Panic, MarketPhase::Recession) => t.panic_to_recession,
        (MarketPhase::Recession, MarketPhase::Recovery) => t.recession_to_recovery,
        (MarketPhase::Recovery, MarketPhase::Prosperity) => t.recovery_to_prosperity,
        _ => 0.0,
    }
}
