//! Engine-level behavior of the execution pipeline through `MarketSim`.
//!
//! These tests run against a "calm" profile — zero volatility, zero impact,
//! no bot flow, no crashes — so prices hold still and cash arithmetic can
//! be checked exactly against the pricing model.

use bourse_core::config::SimConfig;
use bourse_core::domain::{
    NoNotifications, NotificationKind, NotificationLedger, OrderAction, OrderKind, TradeSide,
};
use bourse_core::error::{ExpiryReason, FailureReason};
use bourse_core::pricing;
use bourse_core::{default_roster, MarketSim, OrderDraft};
use std::cell::RefCell;
use std::collections::HashSet;

fn calm_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.market.base_volatility = 0.0;
    config.market.impact_per_share = 0.0;
    config.bots.order_probability = 0.0;
    config.market_maker.quote_shares = 0;
    config.phase.crash.base_probability = 0.0;
    config.phase.crash.probability_per_cycle = 0.0;
    config
}

fn calm_sim(cash: f64) -> MarketSim {
    MarketSim::new(calm_config(), 42, default_roster(), cash)
}

/// Notification ledger that remembers everything it has been shown.
#[derive(Default)]
struct SeenNotifications(RefCell<HashSet<String>>);

impl SeenNotifications {
    fn absorb(&self, keys: impl IntoIterator<Item = String>) {
        self.0.borrow_mut().extend(keys);
    }
}

impl NotificationLedger for SeenNotifications {
    fn exists(&self, message_key: &str) -> bool {
        self.0.borrow().contains(message_key)
    }
}

// ── New-order grace cycle ──────────────────────────────────────────────

#[test]
fn market_order_does_not_execute_in_its_creation_cycle() {
    let mut sim = calm_sim(100_000.0);
    sim.place_order(OrderDraft::market("NYMN", OrderAction::Buy, 10))
        .unwrap();

    let first = sim.run_cycle(&NoNotifications).unwrap();
    assert!(first.trades.is_empty());
    assert_eq!(sim.pending_orders().len(), 1);

    let second = sim.run_cycle(&NoNotifications).unwrap();
    assert_eq!(second.trades.len(), 1);
    assert!(sim.pending_orders().is_empty());
}

#[test]
fn limit_order_validity_does_not_tick_in_its_creation_cycle() {
    let mut sim = calm_sim(100_000.0);
    // Limit far below the price: never triggers, just ages.
    sim.place_order(OrderDraft::limit("NYMN", OrderAction::Buy, 10, 50.0, 5))
        .unwrap();

    sim.run_cycle(&NoNotifications).unwrap();
    assert_eq!(sim.pending_orders()[0].remaining_cycles, 5);

    sim.run_cycle(&NoNotifications).unwrap();
    assert_eq!(sim.pending_orders()[0].remaining_cycles, 4);
}

// ── Buy / sell execution ───────────────────────────────────────────────

#[test]
fn market_buy_settles_through_the_pricing_model() {
    let mut sim = calm_sim(100_000.0);
    let price = sim.stock("NYMN").unwrap().price;
    sim.place_order(OrderDraft::market("NYMN", OrderAction::Buy, 10))
        .unwrap();

    sim.run_cycle(&NoNotifications).unwrap();
    let report = sim.run_cycle(&NoNotifications).unwrap();

    let expected = pricing::execute(&calm_config().mechanics, price, 10, TradeSide::Buy, 1.0);
    let trade = &report.trades[0];
    assert_eq!(trade.shares, 10);
    assert!((trade.total - expected.total).abs() < 1e-9);
    assert_eq!(sim.portfolio().shares_held("NYMN"), 10);
    assert!((sim.portfolio().cash - (100_000.0 - expected.total)).abs() < 1e-9);
}

#[test]
fn sell_without_shares_fails_and_stays_pending() {
    let mut sim = calm_sim(100_000.0);
    sim.place_order(OrderDraft::market("NYMN", OrderAction::Sell, 5))
        .unwrap();

    sim.run_cycle(&NoNotifications).unwrap();
    let report = sim.run_cycle(&NoNotifications).unwrap();

    assert_eq!(report.trades.len(), 0);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0].reason,
        FailureReason::InsufficientShares {
            required: 5,
            available: 0
        }
    ));
    // Recoverable: the order is still there for retry next cycle.
    assert_eq!(sim.pending_orders().len(), 1);
}

#[test]
fn failure_alerts_are_deduplicated_through_the_ledger() {
    let mut sim = calm_sim(10.0); // can't afford anything
    sim.place_order(OrderDraft::market("NYMN", OrderAction::Buy, 10))
        .unwrap();

    let seen = SeenNotifications::default();
    sim.run_cycle(&seen).unwrap();

    let first = sim.run_cycle(&seen).unwrap();
    assert_eq!(first.failed.len(), 1);
    assert_eq!(first.notifications.len(), 1);
    assert_eq!(first.notifications[0].kind, NotificationKind::OrderFailed);
    seen.absorb(first.notifications.iter().map(|n| n.message_key.clone()));

    // Same order, same failure, alert still showing: stay quiet.
    let second = sim.run_cycle(&seen).unwrap();
    assert!(second.failed.is_empty());
    assert!(second.notifications.is_empty());
    assert_eq!(sim.pending_orders().len(), 1);
}

// ── Expiry ─────────────────────────────────────────────────────────────

#[test]
fn untriggered_limit_order_expires_with_reason_and_notification() {
    let mut sim = calm_sim(100_000.0);
    let id = sim
        .place_order(OrderDraft::limit("NYMN", OrderAction::Buy, 10, 50.0, 2))
        .unwrap();

    sim.run_cycle(&NoNotifications).unwrap(); // grace
    sim.run_cycle(&NoNotifications).unwrap(); // 2 → 1
    let report = sim.run_cycle(&NoNotifications).unwrap(); // lapse

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].order_id, id);
    assert!(matches!(
        report.failed[0].reason,
        FailureReason::Expired {
            reason: ExpiryReason::LimitNeverReached
        }
    ));
    let expiry_note = report
        .notifications
        .iter()
        .find(|n| n.kind == NotificationKind::OrderExpired)
        .expect("expiry notification");
    assert_eq!(expiry_note.order_id, Some(id));

    // Removed from the pipeline and from the book.
    assert!(sim.pending_orders().is_empty());
    assert!(sim.book("NYMN").unwrap().is_empty());
}

#[test]
fn market_orders_never_expire() {
    let mut sim = calm_sim(10.0); // unaffordable forever
    sim.place_order(OrderDraft::market("NYMN", OrderAction::Buy, 10))
        .unwrap();
    for _ in 0..20 {
        sim.run_cycle(&NoNotifications).unwrap();
    }
    assert_eq!(sim.pending_orders().len(), 1);
}

// ── Stop / stop-limit flow ─────────────────────────────────────────────

#[test]
fn stop_loss_fires_when_price_breaks_down() {
    let mut sim = calm_sim(100_000.0);
    // Acquire shares first.
    sim.place_order(OrderDraft::market("GILD", OrderAction::Buy, 20))
        .unwrap();
    sim.run_cycle(&NoNotifications).unwrap();
    sim.run_cycle(&NoNotifications).unwrap();
    assert_eq!(sim.portfolio().shares_held("GILD"), 20);

    // Stop well above the (flat) price: triggers immediately once active.
    let mut draft = OrderDraft::market("GILD", OrderAction::Sell, 20);
    draft.kind = OrderKind::Stop { stop: 90.0 };
    draft.validity_cycles = 10;
    sim.place_order(draft).unwrap();

    sim.run_cycle(&NoNotifications).unwrap(); // grace
    let report = sim.run_cycle(&NoNotifications).unwrap();
    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].action, OrderAction::Sell);
    assert_eq!(sim.portfolio().shares_held("GILD"), 0);
}

// ── Margin loans ───────────────────────────────────────────────────────

#[test]
fn buy_draws_attached_loan_for_the_shortfall() {
    let mut config = calm_config();
    config.loan.duration_cycles = 3;
    let mut sim = MarketSim::new(config.clone(), 42, default_roster(), 1_000.0);
    let price = sim.stock("NYMN").unwrap().price;

    sim.place_order(OrderDraft::market("NYMN", OrderAction::Buy, 100).with_loan(15_000.0))
        .unwrap();
    sim.run_cycle(&NoNotifications).unwrap();
    let report = sim.run_cycle(&NoNotifications).unwrap();

    assert_eq!(report.trades.len(), 1);
    assert_eq!(sim.portfolio().shares_held("NYMN"), 100);
    assert_eq!(sim.portfolio().loans.len(), 1);

    // Net disbursement covered the shortfall exactly: cash ends at zero.
    assert!(sim.portfolio().cash.abs() < 1e-6);
    let expected = pricing::execute(&config.mechanics, price, 100, TradeSide::Buy, 1.0);
    let loan = &sim.portfolio().loans[0];
    let fee = config.loan.origination_fee_percent;
    assert!((loan.principal * (1.0 - fee) - (expected.total - 1_000.0)).abs() < 1e-6);

    // Term is 3 cycles; maturity auto-repays principal + interest.
    sim.run_cycle(&NoNotifications).unwrap();
    let maturity = sim.run_cycle(&NoNotifications).unwrap();
    assert!(sim.portfolio().loans.is_empty());
    assert!(maturity
        .notifications
        .iter()
        .any(|n| n.kind == NotificationKind::LoanRepaid));
    assert!(sim.portfolio().cash < 0.0); // debt settled out of cash
}

#[test]
fn buy_without_loan_or_cash_reports_insufficient_funds() {
    let mut sim = calm_sim(100.0);
    sim.place_order(OrderDraft::market("NYMN", OrderAction::Buy, 100))
        .unwrap();
    sim.run_cycle(&NoNotifications).unwrap();
    let report = sim.run_cycle(&NoNotifications).unwrap();
    assert!(matches!(
        report.failed[0].reason,
        FailureReason::InsufficientFunds {
            loan_limit_reached: false,
            ..
        }
    ));
}

#[test]
fn loan_slots_are_limited_across_booked_loans() {
    let mut config = calm_config();
    config.loan.max_concurrent = 1;
    config.loan.duration_cycles = 100;
    let mut sim = MarketSim::new(config, 42, default_roster(), 1_000.0);

    // First levered buy books the only loan slot.
    sim.place_order(OrderDraft::market("GILD", OrderAction::Buy, 100).with_loan(10_000.0))
        .unwrap();
    sim.run_cycle(&NoNotifications).unwrap();
    sim.run_cycle(&NoNotifications).unwrap();
    assert_eq!(sim.portfolio().loans.len(), 1);

    // Second levered buy hits the cap: distinguished failure.
    sim.place_order(OrderDraft::market("NYMN", OrderAction::Buy, 100).with_loan(20_000.0))
        .unwrap();
    sim.run_cycle(&NoNotifications).unwrap();
    let report = sim.run_cycle(&NoNotifications).unwrap();
    assert!(matches!(
        report.failed[0].reason,
        FailureReason::InsufficientFunds {
            loan_limit_reached: true,
            ..
        }
    ));
    let key = &report.notifications[0].message_key;
    assert!(key.contains("loan_limit"), "got key {key}");
}
