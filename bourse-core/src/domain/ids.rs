use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a pending order in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order-{}", self.0)
    }
}

/// Identifier of a resting entry in an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

/// Who placed an order or book entry.
///
/// The player is singular; bots are numbered; the market maker is its own
/// participant so its quotes can be recognized on both sides of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraderId {
    Player,
    MarketMaker,
    Bot(u32),
}

impl TraderId {
    pub fn is_player(&self) -> bool {
        matches!(self, TraderId::Player)
    }
}

impl fmt::Display for TraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraderId::Player => write!(f, "player"),
            TraderId::MarketMaker => write!(f, "market-maker"),
            TraderId::Bot(n) => write!(f, "bot-{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(OrderId(7).to_string(), "order-7");
        assert_eq!(EntryId(3).to_string(), "entry-3");
        assert_eq!(TraderId::Bot(2).to_string(), "bot-2");
        assert_eq!(TraderId::Player.to_string(), "player");
    }

    #[test]
    fn trader_identity() {
        assert!(TraderId::Player.is_player());
        assert!(!TraderId::MarketMaker.is_player());
        assert!(!TraderId::Bot(0).is_player());
    }
}
