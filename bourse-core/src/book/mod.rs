//! Per-symbol order book: bid/ask ladders with price-time priority.
//!
//! Both ladders are kept fully sorted at all times — bids by (price DESC,
//! time ASC), asks by (price ASC, time ASC) — so the best entry is always
//! at the front and the matcher can walk in priority order. The book owns
//! its entries exclusively; matching reports ids and quantities only.

pub mod matching;

pub use matching::{match_order, Fill, MatchOutcome};

use crate::domain::{BookSide, EntryId, OrderBookEntry, OrderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    symbol: String,
    bids: Vec<OrderBookEntry>,
    asks: Vec<OrderBookEntry>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self, side: BookSide) -> &[OrderBookEntry] {
        match side {
            BookSide::Bid => &self.bids,
            BookSide::Ask => &self.asks,
        }
    }

    pub fn best_bid(&self) -> Option<&OrderBookEntry> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderBookEntry> {
        self.asks.first()
    }

    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Insert an entry at its sorted position.
    pub fn insert(&mut self, entry: OrderBookEntry) {
        debug_assert!(
            !self.contains(entry.id),
            "duplicate entry id {}",
            entry.id
        );
        debug_assert_eq!(entry.symbol, self.symbol, "entry belongs to another book");

        let side = entry.side;
        let ladder = self.ladder_mut(side);
        let position = ladder.partition_point(|resident| !ranks_before(&entry, resident, side));
        ladder.insert(position, entry);
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.get(id).is_some()
    }

    /// Look up a resident entry by id.
    pub fn get(&self, id: EntryId) -> Option<&OrderBookEntry> {
        self.bids.iter().chain(self.asks.iter()).find(|e| e.id == id)
    }

    /// Remove an entry by id.
    pub fn cancel(&mut self, id: EntryId) -> Option<OrderBookEntry> {
        for ladder in [&mut self.bids, &mut self.asks] {
            if let Some(position) = ladder.iter().position(|e| e.id == id) {
                return Some(ladder.remove(position));
            }
        }
        None
    }

    /// Remove the resting entry mirroring a player pending order.
    pub fn remove_by_origin(&mut self, origin: OrderId) -> Option<OrderBookEntry> {
        for ladder in [&mut self.bids, &mut self.asks] {
            if let Some(position) = ladder.iter().position(|e| e.origin == Some(origin)) {
                return Some(ladder.remove(position));
            }
        }
        None
    }

    /// Age bot entries by one cycle and purge the expired.
    ///
    /// Entries carrying an `origin` reference are the player's and are
    /// exempt: their lifetime is governed by the pending order itself.
    pub fn tick_cycles(&mut self) {
        for ladder in [&mut self.bids, &mut self.asks] {
            for entry in ladder.iter_mut() {
                if let Some(remaining) = entry.remaining_cycles.as_mut() {
                    *remaining = remaining.saturating_sub(1);
                }
            }
            ladder.retain(|entry| entry.origin.is_some() || entry.remaining_cycles != Some(0));
        }
    }

    /// Apply a forward split in place: shares up, price down, notional kept.
    pub fn apply_split(&mut self, ratio: u32) {
        let ratio_f = f64::from(ratio);
        for ladder in [&mut self.bids, &mut self.asks] {
            for entry in ladder.iter_mut() {
                entry.shares *= ratio;
                entry.price /= ratio_f;
            }
        }
        // Scaling every price by the same factor preserves both orders.
        debug_assert!(self.is_sorted());
    }

    /// Shrink one entry by a partial-fill amount, removing it when empty.
    pub fn reduce(&mut self, id: EntryId, shares: u32) {
        for ladder in [&mut self.bids, &mut self.asks] {
            if let Some(position) = ladder.iter().position(|e| e.id == id) {
                let entry = &mut ladder[position];
                entry.shares = entry.shares.saturating_sub(shares);
                if entry.shares == 0 {
                    ladder.remove(position);
                }
                return;
            }
        }
    }

    /// Consume a match outcome: drop fully matched entries, shrink partials.
    pub fn apply_outcome(&mut self, outcome: &MatchOutcome) {
        for id in &outcome.filled {
            self.cancel(*id);
        }
        for (id, matched_shares) in &outcome.partial_fills {
            for ladder in [&mut self.bids, &mut self.asks] {
                if let Some(entry) = ladder.iter_mut().find(|e| e.id == *id) {
                    entry.shares = entry.shares.saturating_sub(*matched_shares);
                }
            }
        }
    }

    /// Sort invariant check, used by tests and debug assertions.
    /// A ladder is sorted when no entry outranks its predecessor.
    pub fn is_sorted(&self) -> bool {
        let bids_ok = self
            .bids
            .windows(2)
            .all(|w| !ranks_before(&w[1], &w[0], BookSide::Bid));
        let asks_ok = self
            .asks
            .windows(2)
            .all(|w| !ranks_before(&w[1], &w[0], BookSide::Ask));
        bids_ok && asks_ok
    }

    fn ladder_mut(&mut self, side: BookSide) -> &mut Vec<OrderBookEntry> {
        match side {
            BookSide::Bid => &mut self.bids,
            BookSide::Ask => &mut self.asks,
        }
    }
}

/// Price-time priority: whether `a` outranks `b` on the given side.
fn ranks_before(a: &OrderBookEntry, b: &OrderBookEntry, side: BookSide) -> bool {
    let price_better = match side {
        BookSide::Bid => a.price > b.price,
        BookSide::Ask => a.price < b.price,
    };
    price_better || (a.price == b.price && a.timestamp < b.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TraderId;

    fn entry(
        id: u64,
        trader: TraderId,
        side: BookSide,
        price: f64,
        shares: u32,
        timestamp: u64,
    ) -> OrderBookEntry {
        OrderBookEntry {
            id: EntryId(id),
            trader,
            symbol: "ACME".into(),
            side,
            shares,
            price,
            timestamp,
            remaining_cycles: match trader {
                TraderId::Player => None,
                _ => Some(3),
            },
            origin: match trader {
                TraderId::Player => Some(OrderId(id)),
                _ => None,
            },
        }
    }

    fn bot_bid(id: u64, price: f64, ts: u64) -> OrderBookEntry {
        entry(id, TraderId::Bot(1), BookSide::Bid, price, 100, ts)
    }

    fn bot_ask(id: u64, price: f64, ts: u64) -> OrderBookEntry {
        entry(id, TraderId::Bot(1), BookSide::Ask, price, 100, ts)
    }

    #[test]
    fn bids_sort_price_desc_time_asc() {
        let mut book = OrderBook::new("ACME");
        book.insert(bot_bid(1, 99.0, 5));
        book.insert(bot_bid(2, 101.0, 6));
        book.insert(bot_bid(3, 101.0, 2));
        book.insert(bot_bid(4, 100.0, 1));

        let prices: Vec<(f64, u64)> = book
            .side(BookSide::Bid)
            .iter()
            .map(|e| (e.price, e.timestamp))
            .collect();
        assert_eq!(prices, vec![(101.0, 2), (101.0, 6), (100.0, 1), (99.0, 5)]);
        assert!(book.is_sorted());
    }

    #[test]
    fn asks_sort_price_asc_time_asc() {
        let mut book = OrderBook::new("ACME");
        book.insert(bot_ask(1, 103.0, 5));
        book.insert(bot_ask(2, 101.0, 6));
        book.insert(bot_ask(3, 101.0, 2));

        let prices: Vec<(f64, u64)> = book
            .side(BookSide::Ask)
            .iter()
            .map(|e| (e.price, e.timestamp))
            .collect();
        assert_eq!(prices, vec![(101.0, 2), (101.0, 6), (103.0, 5)]);
        assert!(book.is_sorted());
    }

    #[test]
    fn best_entries_sit_at_the_front() {
        let mut book = OrderBook::new("ACME");
        book.insert(bot_bid(1, 99.0, 1));
        book.insert(bot_bid(2, 100.0, 2));
        book.insert(bot_ask(3, 102.0, 3));
        book.insert(bot_ask(4, 101.0, 4));

        assert_eq!(book.best_bid().unwrap().price, 100.0);
        assert_eq!(book.best_ask().unwrap().price, 101.0);
    }

    #[test]
    fn cancel_removes_and_keeps_sort() {
        let mut book = OrderBook::new("ACME");
        book.insert(bot_bid(1, 99.0, 1));
        book.insert(bot_bid(2, 100.0, 2));

        let removed = book.cancel(EntryId(2)).unwrap();
        assert_eq!(removed.id, EntryId(2));
        assert!(book.cancel(EntryId(2)).is_none());
        assert_eq!(book.len(), 1);
        assert!(book.is_sorted());
    }

    #[test]
    fn tick_expires_bot_entries_only() {
        let mut book = OrderBook::new("ACME");
        let mut short_lived = bot_bid(1, 99.0, 1);
        short_lived.remaining_cycles = Some(1);
        book.insert(short_lived);
        book.insert(entry(2, TraderId::Player, BookSide::Bid, 98.0, 50, 2));

        book.tick_cycles();
        // Bot entry hit zero and was purged; the player entry survives forever.
        assert_eq!(book.len(), 1);
        assert!(book.best_bid().unwrap().is_player());

        for _ in 0..10 {
            book.tick_cycles();
        }
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn split_preserves_notional() {
        let mut book = OrderBook::new("ACME");
        book.insert(bot_bid(1, 100.0, 1));
        let notional_before: f64 = book
            .side(BookSide::Bid)
            .iter()
            .map(|e| e.price * f64::from(e.shares))
            .sum();

        book.apply_split(4);

        let entry = book.best_bid().unwrap();
        assert_eq!(entry.shares, 400);
        assert_eq!(entry.price, 25.0);
        let notional_after: f64 = book
            .side(BookSide::Bid)
            .iter()
            .map(|e| e.price * f64::from(e.shares))
            .sum();
        assert!((notional_before - notional_after).abs() < 1e-9);
    }

    #[test]
    fn remove_by_origin_finds_player_entries() {
        let mut book = OrderBook::new("ACME");
        book.insert(entry(7, TraderId::Player, BookSide::Ask, 105.0, 20, 1));
        book.insert(bot_ask(8, 104.0, 2));

        let pulled = book.remove_by_origin(OrderId(7)).unwrap();
        assert_eq!(pulled.id, EntryId(7));
        assert!(book.remove_by_origin(OrderId(7)).is_none());
        assert_eq!(book.len(), 1);
    }
}
