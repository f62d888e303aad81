//! Property-based tests for order book invariants
//!
//! Random event streams must never break:
//!
//! - Index/level/arena consistency, no empty levels
//! - Positive price and quantity on every resting order
//! - Strict price ordering of depth on both sides
//! - Quantity conservation through matching
//! - Finite, bounded metrics

use crate::assertions::assert_orderbook_invariants;
use common::Qty;
use lob_replay::{
    ApplyOutcome, Event, EventBuilder, MetricsCalculator, OrderBook, Rejection, Side,
};
use proptest::prelude::*;

/// Generate prices in a narrow band so orders cross often
fn arb_price() -> impl Strategy<Value = i64> {
    95i64..=105i64
}

/// Generate valid quantity values
fn arb_quantity() -> impl Strategy<Value = i64> {
    1i64..=50i64
}

/// Generate order side
fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

/// Small id space so cancels and modifies hit live orders
fn arb_order_id() -> impl Strategy<Value = u64> {
    1u64..=40u64
}

/// Few users, including unattributed
fn arb_user() -> impl Strategy<Value = u64> {
    0u64..=3u64
}

#[derive(Debug, Clone)]
enum Action {
    New(u64, Side, i64, i64, u64),
    Modify(u64, Side, i64, i64, u64),
    Cancel(u64),
    Trade(u64, u64),
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        5 => (arb_order_id(), arb_side(), arb_price(), arb_quantity(), arb_user())
            .prop_map(|(id, side, price, qty, user)| Action::New(id, side, price, qty, user)),
        2 => (arb_order_id(), arb_side(), arb_price(), arb_quantity(), arb_user())
            .prop_map(|(id, side, price, qty, user)| Action::Modify(id, side, price, qty, user)),
        2 => arb_order_id().prop_map(Action::Cancel),
        1 => (arb_order_id(), arb_order_id()).prop_map(|(b, s)| Action::Trade(b, s)),
    ]
}

fn build_events(actions: &[Action]) -> Vec<Event> {
    let mut ev = EventBuilder::new();
    actions
        .iter()
        .map(|action| match *action {
            Action::New(id, side, price, qty, user) => ev.new_order(id, side, price, qty, user),
            Action::Modify(id, side, price, qty, user) => ev.modify(id, side, price, qty, user),
            Action::Cancel(id) => ev.cancel(id),
            Action::Trade(buy, sell) => ev.trade(buy, sell, 100, 1),
        })
        .collect()
}

fn total_quantity(book: &OrderBook) -> i64 {
    let side_total = |side| -> i64 {
        book.depth(side, usize::MAX)
            .iter()
            .map(|(_, q)| q.as_i64())
            .sum()
    };
    side_total(Side::Buy) + side_total(Side::Sell)
}

#[cfg(test)]
mod structural_invariants {
    use super::*;

    proptest! {
        #[test]
        fn prop_invariants_hold_after_every_event(
            actions in prop::collection::vec(arb_action(), 1..200)
        ) {
            let mut book = OrderBook::new();
            for event in build_events(&actions) {
                book.apply(&event);
                prop_assert!(book.verify_integrity().is_ok(), "{:?}", book.verify_integrity());
            }
            assert_orderbook_invariants(&book);
        }

        #[test]
        fn prop_unattributed_book_never_stays_crossed(
            actions in prop::collection::vec(arb_action(), 1..200)
        ) {
            // With user 0 everywhere no guard can stop matching
            let anonymous: Vec<Action> = actions
                .into_iter()
                .map(|a| match a {
                    Action::New(id, side, p, q, _) => Action::New(id, side, p, q, 0),
                    Action::Modify(id, side, p, q, _) => Action::Modify(id, side, p, q, 0),
                    other => other,
                })
                .collect();

            let mut book = OrderBook::new();
            for event in build_events(&anonymous) {
                book.apply(&event);
                let (bid, ask) = book.best_bid_ask();
                if bid.is_positive() && ask.is_positive() {
                    prop_assert!(bid < ask, "crossed book: bid {} ask {}", bid, ask);
                }
            }
        }
    }
}

#[cfg(test)]
mod event_semantics {
    use super::*;

    proptest! {
        #[test]
        fn prop_quantity_is_conserved_by_new_orders(
            actions in prop::collection::vec(arb_action(), 0..100),
            side in arb_side(),
            price in arb_price(),
            quantity in arb_quantity(),
        ) {
            let mut book = OrderBook::new();
            for event in build_events(&actions) {
                book.apply(&event);
            }
            let before = total_quantity(&book);

            let incoming = Event::new_order(
                common::Ts::from_nanos(u64::MAX),
                1_000,
                side,
                common::Px::from_i64(price),
                Qty::from_i64(quantity),
                0,
            );
            let outcome = book.apply(&incoming);
            let placement = match outcome {
                ApplyOutcome::Placed(placement) => placement,
                other => return Err(TestCaseError::fail(format!("unexpected outcome {other:?}"))),
            };

            prop_assert_eq!(placement.filled + placement.resting, Qty::from_i64(quantity));
            // Filled quantity leaves the opposite side; the remainder joins ours
            let after = total_quantity(&book);
            prop_assert_eq!(
                after,
                before - placement.filled.as_i64() + placement.resting.as_i64()
            );
        }

        #[test]
        fn prop_cancel_is_idempotent(
            actions in prop::collection::vec(arb_action(), 0..100),
            order_id in arb_order_id(),
        ) {
            let mut book = OrderBook::new();
            let mut ev = EventBuilder::new();
            for event in build_events(&actions) {
                book.apply(&event);
            }

            book.apply(&ev.cancel(order_id));
            prop_assert!(book.order(order_id).is_none());
            let depth = (book.depth(Side::Buy, usize::MAX), book.depth(Side::Sell, usize::MAX));

            let second = book.apply(&ev.cancel(order_id));
            prop_assert_eq!(second, ApplyOutcome::NotFound { order_id });
            prop_assert_eq!(
                (book.depth(Side::Buy, usize::MAX), book.depth(Side::Sell, usize::MAX)),
                depth
            );
        }

        #[test]
        fn prop_self_trade_rejection_leaves_book_unchanged(
            actions in prop::collection::vec(arb_action(), 0..100),
            side in arb_side(),
            price in arb_price(),
            quantity in arb_quantity(),
            user in 1u64..=3u64,
        ) {
            let mut book = OrderBook::new();
            for event in build_events(&actions) {
                book.apply(&event);
            }
            let incoming = Event::new_order(
                common::Ts::from_nanos(u64::MAX),
                2_000,
                side,
                common::Px::from_i64(price),
                Qty::from_i64(quantity),
                user,
            );

            let flagged = book.would_self_trade(&incoming);
            let before = (book.depth(Side::Buy, usize::MAX), book.depth(Side::Sell, usize::MAX));
            let outcome = book.apply(&incoming);

            if flagged {
                prop_assert_eq!(
                    outcome.rejection(),
                    Some(&Rejection::SelfTrade { order_id: 2_000, user_id: user })
                );
                prop_assert_eq!(
                    (book.depth(Side::Buy, usize::MAX), book.depth(Side::Sell, usize::MAX)),
                    before
                );
            } else {
                prop_assert!(matches!(outcome, ApplyOutcome::Placed(_)));
            }
        }

        #[test]
        fn prop_metrics_are_finite_and_bounded(
            actions in prop::collection::vec(arb_action(), 0..150),
            depth_levels in 0usize..8,
            decay_lambda in 0.0f64..=1.0,
        ) {
            let mut book = OrderBook::new();
            for event in build_events(&actions) {
                book.apply(&event);
            }
            let metrics = MetricsCalculator::calculate(
                &book,
                common::Ts::from_nanos(1),
                depth_levels,
                decay_lambda,
            );

            prop_assert!(metrics.ofi_top.is_finite());
            prop_assert!(metrics.ofi_depth.is_finite());
            prop_assert!((-1.0..=1.0).contains(&metrics.ofi_top));
            prop_assert_eq!(metrics.depth_bids.len(), depth_levels);
            prop_assert_eq!(metrics.depth_asks.len(), depth_levels);
            prop_assert!(metrics.depth_bids.iter().all(|q| q.as_i64() >= 0));
        }
    }
}
