//! Pure order matcher.
//!
//! Walks one side of a book against an incoming entry in priority order and
//! reports what would trade. The matcher never mutates the book — the
//! caller applies the outcome with [`OrderBook::apply_outcome`] — and it
//! retains no references across the call.

use super::OrderBook;
use crate::domain::{BookSide, EntryId, OrderBookEntry, Trade};

/// One resident entry touched by a match, parallel to `trades`.
#[derive(Debug, Clone, Copy)]
pub struct Fill {
    pub entry: EntryId,
    pub shares: u32,
    pub price: f64,
    /// Whether the resident entry was completely consumed.
    pub exhausted: bool,
}

/// What an incoming order would do to the book.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Executions, in the order they would occur.
    pub trades: Vec<Trade>,
    /// Per-resident fill detail, one per trade, in the same order.
    pub fills: Vec<Fill>,
    /// Resting entries completely consumed.
    pub filled: Vec<EntryId>,
    /// Resting entries partially consumed, with the shares taken.
    pub partial_fills: Vec<(EntryId, u32)>,
    /// Incoming shares left unmatched.
    pub unfilled_shares: u32,
}

impl MatchOutcome {
    pub fn matched_shares(&self) -> u32 {
        self.trades.iter().map(|t| t.shares).sum()
    }
}

/// Whether a bid and an ask can trade.
pub fn can_match(bid_price: f64, ask_price: f64) -> bool {
    bid_price >= ask_price
}

/// Match `incoming` against the opposite side of `book`.
///
/// Entries from the same trader are skipped, never traded against. The walk
/// stops at the first incompatible price (the ladder is sorted, so nothing
/// beyond it can match) or when the incoming shares run out. The execution
/// price is the maker's — the entry with the earlier timestamp — and the
/// midpoint when timestamps tie.
pub fn match_order(incoming: &OrderBookEntry, book: &OrderBook, cycle: u64) -> MatchOutcome {
    let mut outcome = MatchOutcome {
        unfilled_shares: incoming.shares,
        ..MatchOutcome::default()
    };

    for resident in book.side(incoming.side.opposite()) {
        if outcome.unfilled_shares == 0 {
            break;
        }
        if resident.trader == incoming.trader {
            continue;
        }

        let compatible = match incoming.side {
            BookSide::Bid => can_match(incoming.price, resident.price),
            BookSide::Ask => can_match(resident.price, incoming.price),
        };
        if !compatible {
            break;
        }

        let shares = outcome.unfilled_shares.min(resident.shares);
        let price = execution_price(incoming, resident);
        let (buyer, seller) = match incoming.side {
            BookSide::Bid => (incoming.trader, resident.trader),
            BookSide::Ask => (resident.trader, incoming.trader),
        };

        outcome.trades.push(Trade {
            symbol: incoming.symbol.clone(),
            buyer,
            seller,
            shares,
            price,
            cycle,
        });
        let exhausted = shares == resident.shares;
        outcome.fills.push(Fill {
            entry: resident.id,
            shares,
            price,
            exhausted,
        });
        if exhausted {
            outcome.filled.push(resident.id);
        } else {
            outcome.partial_fills.push((resident.id, shares));
        }
        outcome.unfilled_shares -= shares;
    }

    outcome
}

/// Maker's price; midpoint when neither entry is strictly earlier.
fn execution_price(incoming: &OrderBookEntry, resident: &OrderBookEntry) -> f64 {
    if resident.timestamp < incoming.timestamp {
        resident.price
    } else if incoming.timestamp < resident.timestamp {
        incoming.price
    } else {
        (incoming.price + resident.price) / 2.0
    }
}
