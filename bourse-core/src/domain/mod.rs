//! Domain types: stocks, orders, book entries, portfolio, events.

pub mod entry;
pub mod events;
pub mod ids;
pub mod order;
pub mod portfolio;
pub mod stock;

pub use entry::{BookSide, OrderBookEntry};
pub use events::{
    ClimateEntry, CycleReport, FailedOrder, NoNotifications, NotificationKind,
    NotificationLedger, NotificationRequest, PhaseChange, PhaseScope, Trade, TradeRecord,
};
pub use ids::{EntryId, OrderId, TraderId};
pub use order::{LoanRequest, OrderAction, OrderKind, PendingOrder, TradeSide};
pub use portfolio::{Loan, Portfolio, ShortPosition};
pub use stock::{Candle, Sector, Stock};
