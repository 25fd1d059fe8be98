//! The player's holdings, cash, loans, and short positions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A booked margin loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    /// Gross principal; the origination fee was withheld at disbursement.
    pub principal: f64,
    /// Per-cycle rate locked when the order was placed.
    pub rate: f64,
    pub remaining_cycles: u32,
    pub accrued_interest: f64,
}

impl Loan {
    /// One cycle of simple interest on the principal.
    pub fn accrue(&mut self) {
        self.accrued_interest += self.principal * self.rate;
    }

    /// Amount due if the loan were settled now.
    pub fn payoff(&self) -> f64 {
        self.principal + self.accrued_interest
    }
}

/// Borrowed-and-sold shares plus the collateral pledged against them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortPosition {
    pub symbol: String,
    pub shares: u32,
    /// Average effective sale price across openings.
    pub entry_price: f64,
    pub collateral: f64,
}

impl ShortPosition {
    /// Mark-to-market profit at the given price (positive when the price fell).
    pub fn unrealized(&self, price: f64) -> f64 {
        (self.entry_price - price) * f64::from(self.shares)
    }
}

/// Aggregate portfolio state for the single human trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub holdings: BTreeMap<String, u32>,
    pub loans: Vec<Loan>,
    pub shorts: BTreeMap<String, ShortPosition>,
}

impl Portfolio {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            holdings: BTreeMap::new(),
            loans: Vec::new(),
            shorts: BTreeMap::new(),
        }
    }

    pub fn shares_held(&self, symbol: &str) -> u32 {
        self.holdings.get(symbol).copied().unwrap_or(0)
    }

    pub fn add_shares(&mut self, symbol: &str, shares: u32) {
        *self.holdings.entry(symbol.to_string()).or_insert(0) += shares;
    }

    /// Remove shares, dropping the entry once flat.
    pub fn remove_shares(&mut self, symbol: &str, shares: u32) {
        if let Some(held) = self.holdings.get_mut(symbol) {
            *held = held.saturating_sub(shares);
            if *held == 0 {
                self.holdings.remove(symbol);
            }
        }
    }

    /// Net liquidation value: cash + long holdings + short collateral and
    /// mark-to-market, minus loan payoffs.
    pub fn equity(&self, prices: &BTreeMap<String, f64>) -> f64 {
        let long_value: f64 = self
            .holdings
            .iter()
            .map(|(symbol, shares)| {
                prices.get(symbol).copied().unwrap_or(0.0) * f64::from(*shares)
            })
            .sum();
        let short_value: f64 = self
            .shorts
            .values()
            .map(|short| {
                let price = prices.get(&short.symbol).copied().unwrap_or(short.entry_price);
                short.collateral + short.unrealized(price)
            })
            .sum();
        let debt: f64 = self.loans.iter().map(Loan::payoff).sum();
        self.cash + long_value + short_value - debt
    }
}
