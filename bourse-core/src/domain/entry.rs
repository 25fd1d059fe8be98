//! Resting order-book entries.

use super::ids::{EntryId, OrderId, TraderId};
use serde::{Deserialize, Serialize};

/// Which ladder of the book an entry rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookSide {
    Bid,
    Ask,
}

impl BookSide {
    pub fn opposite(self) -> BookSide {
        match self {
            BookSide::Bid => BookSide::Ask,
            BookSide::Ask => BookSide::Bid,
        }
    }
}

/// A resting order in a symbol's book.
///
/// Exclusively owned by its book; matching reports ids and share counts,
/// never references that outlive the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookEntry {
    pub id: EntryId,
    pub trader: TraderId,
    pub symbol: String,
    pub side: BookSide,
    pub shares: u32,
    pub price: f64,
    /// Monotone placement sequence; earlier value wins price ties and
    /// decides who the maker is in a match.
    pub timestamp: u64,
    /// Bot entries churn out of the book after this many cycles.
    /// Entries carrying an `origin` never expire.
    pub remaining_cycles: Option<u32>,
    /// Back-reference to the player's pending order this entry mirrors.
    pub origin: Option<OrderId>,
}

impl OrderBookEntry {
    pub fn is_player(&self) -> bool {
        self.origin.is_some()
    }
}
