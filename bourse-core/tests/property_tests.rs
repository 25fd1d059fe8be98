//! Property tests for engine invariants.
//!
//! 1. Book sort invariant survives arbitrary insert/cancel sequences
//! 2. Matching conserves shares: trades + unfilled == incoming
//! 3. A book of same-trader orders never self-trades
//! 4. Slippage is monotone in size and capped
//! 5. Buy/sell pricing asymmetry holds for any positive spread

use bourse_core::book::{match_order, OrderBook};
use bourse_core::config::MechanicsConfig;
use bourse_core::domain::{BookSide, EntryId, OrderBookEntry, TradeSide, TraderId};
use bourse_core::pricing;
use proptest::prelude::*;

// ── Strategies ─────────────────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_shares() -> impl Strategy<Value = u32> {
    1u32..500
}

fn arb_side() -> impl Strategy<Value = BookSide> {
    prop_oneof![Just(BookSide::Bid), Just(BookSide::Ask)]
}

fn arb_trader() -> impl Strategy<Value = TraderId> {
    (0u32..6).prop_map(TraderId::Bot)
}

#[derive(Debug, Clone)]
struct EntrySpec {
    side: BookSide,
    price: f64,
    shares: u32,
    trader: TraderId,
}

fn arb_entry() -> impl Strategy<Value = EntrySpec> {
    (arb_side(), arb_price(), arb_shares(), arb_trader()).prop_map(
        |(side, price, shares, trader)| EntrySpec {
            side,
            price,
            shares,
            trader,
        },
    )
}

fn build_book(specs: &[EntrySpec]) -> OrderBook {
    let mut book = OrderBook::new("ACME");
    for (i, spec) in specs.iter().enumerate() {
        book.insert(OrderBookEntry {
            id: EntryId(i as u64 + 1),
            trader: spec.trader,
            symbol: "ACME".into(),
            side: spec.side,
            shares: spec.shares,
            price: spec.price,
            timestamp: i as u64 + 1,
            remaining_cycles: Some(3),
            origin: None,
        });
        assert!(book.is_sorted());
    }
    book
}

// ── 1. Sort invariant ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn book_stays_sorted_under_inserts_and_cancels(
        specs in prop::collection::vec(arb_entry(), 1..40),
        cancel_every in 2usize..5,
    ) {
        let mut book = OrderBook::new("ACME");
        for (i, spec) in specs.iter().enumerate() {
            book.insert(OrderBookEntry {
                id: EntryId(i as u64 + 1),
                trader: spec.trader,
                symbol: "ACME".into(),
                side: spec.side,
                shares: spec.shares,
                price: spec.price,
                timestamp: i as u64 + 1,
                remaining_cycles: Some(3),
                origin: None,
            });
            prop_assert!(book.is_sorted());

            if i % cancel_every == 0 {
                book.cancel(EntryId((i / 2) as u64 + 1));
                prop_assert!(book.is_sorted());
            }
        }
    }
}

// ── 2. Conservation ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn matching_conserves_shares(
        specs in prop::collection::vec(arb_entry(), 0..30),
        incoming_side in arb_side(),
        incoming_price in arb_price(),
        incoming_shares in arb_shares(),
    ) {
        let book = build_book(&specs);
        let incoming = OrderBookEntry {
            id: EntryId(9_999),
            trader: TraderId::Bot(99),
            symbol: "ACME".into(),
            side: incoming_side,
            shares: incoming_shares,
            price: incoming_price,
            timestamp: 9_999,
            remaining_cycles: Some(3),
            origin: None,
        };

        let outcome = match_order(&incoming, &book, 0);

        prop_assert_eq!(
            outcome.matched_shares() + outcome.unfilled_shares,
            incoming.shares
        );
        // Per-fill detail agrees with the trade list.
        let fill_total: u32 = outcome.fills.iter().map(|f| f.shares).sum();
        prop_assert_eq!(fill_total, outcome.matched_shares());
        // Every trade respects the incoming price limit.
        for trade in &outcome.trades {
            match incoming.side {
                BookSide::Bid => prop_assert!(trade.price <= incoming.price + 1e-9),
                BookSide::Ask => prop_assert!(trade.price >= incoming.price - 1e-9),
            }
        }
    }
}

// ── 3. No self-trade ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn same_trader_book_yields_zero_trades(
        mut specs in prop::collection::vec(arb_entry(), 1..20),
        incoming_shares in arb_shares(),
    ) {
        let trader = TraderId::Bot(7);
        for spec in &mut specs {
            spec.trader = trader;
            spec.side = BookSide::Ask;
        }
        let book = build_book(&specs);
        let incoming = OrderBookEntry {
            id: EntryId(9_999),
            trader,
            symbol: "ACME".into(),
            side: BookSide::Bid,
            shares: incoming_shares,
            price: 10_000.0, // crosses everything
            timestamp: 9_999,
            remaining_cycles: Some(3),
            origin: None,
        };

        let outcome = match_order(&incoming, &book, 0);
        prop_assert!(outcome.trades.is_empty());
        prop_assert_eq!(outcome.unfilled_shares, incoming_shares);
    }
}

// ── 4. Slippage monotonicity and cap ───────────────────────────────────

proptest! {
    #[test]
    fn slippage_is_monotone_and_capped(
        base_price in 1.0..1000.0f64,
        slippage_per_share in 0.0..0.01f64,
        max_slippage in 0.001..0.2f64,
        shares in 1u32..400,
    ) {
        let mechanics = MechanicsConfig {
            spread_percent: 0.0,
            slippage_per_share,
            max_slippage,
            fee_percent: 0.0,
            min_fee: 0.0,
        };
        let smaller = pricing::progressive_slippage(&mechanics, base_price, shares);
        let larger = pricing::progressive_slippage(&mechanics, base_price, shares + 1);
        prop_assert!(smaller >= 0.0);
        prop_assert!(larger >= smaller);
        prop_assert!(larger <= base_price * max_slippage + 1e-9);
        // Total slippage paid is bounded by cap × size.
        let total = larger * f64::from(shares + 1);
        prop_assert!(total <= base_price * max_slippage * f64::from(shares + 1) + 1e-6);
    }
}

// ── 5. Pricing asymmetry ───────────────────────────────────────────────

proptest! {
    #[test]
    fn round_trip_at_constant_price_loses_money(
        base_price in 10.0..500.0f64,
        shares in 1u32..200,
        spread_percent in 0.001..0.05f64,
    ) {
        let mechanics = MechanicsConfig {
            spread_percent,
            slippage_per_share: 0.0001,
            max_slippage: 0.05,
            fee_percent: 0.0,
            min_fee: 0.0,
        };
        let buy = pricing::execute(&mechanics, base_price, shares, TradeSide::Buy, 1.0);
        let sell = pricing::execute(&mechanics, base_price, shares, TradeSide::Sell, 1.0);
        prop_assert!(sell.total < buy.total);
        prop_assert!(sell.effective_price <= base_price);
        prop_assert!(buy.effective_price >= base_price);
    }
}
