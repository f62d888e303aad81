//! Unit tests for the exchange CSV adapter
//!
//! Tests cover:
//! - Order and trade row mapping
//! - Malformed row skipping
//! - Merge ordering across files
//! - Missing files

use crate::utils::{order_csv, px, qty, trade_csv};
use anyhow::Result;
use common::Ts;
use lob_replay::feed::{FeedKind, load_events, merge, read_events};
use lob_replay::{EventKind, FeedError, Side};
use rstest::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[rstest]
fn test_order_rows_map_to_events() -> Result<()> {
    let csv = order_csv(&[
        (1_000, 5, "N", 11, "B", 10_050, 20),
        (1_001, 0, "M", 11, "B", 10_055, 15),
        (1_002, 0, "X", 11, "B", 0, 0),
        (1_003, 0, "T", 11, "S", 10_050, 5),
    ]);
    let feed = read_events(csv.as_bytes(), FeedKind::Orders)?;

    assert_eq!(feed.skipped, 0);
    let kinds: Vec<EventKind> = feed.events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::New, EventKind::Modify, EventKind::Cancel, EventKind::Trade]
    );

    let first = feed.events[0];
    assert_eq!(first.timestamp, Ts::from_nanos(1_000_005));
    assert_eq!(first.order_id, 11);
    assert_eq!(first.side, Side::Buy);
    assert_eq!(first.price, px(10_050));
    assert_eq!(first.quantity, qty(20));
    assert_eq!(first.user_id, 0);
    assert_eq!(feed.events[3].side, Side::Sell);
    Ok(())
}

#[rstest]
fn test_optional_user_id_column() -> Result<()> {
    let csv = "h0,h1,h2,h3,h4,h5,h6,h7,h8,h9,h10,h11,h12\n\
               0,10,a,b,c,N,0,1,26000,S,500,3,77\n\
               1,11,a,b,c,N,0,2,26000,S,500,3,\n";
    let feed = read_events(csv.as_bytes(), FeedKind::Orders)?;
    assert_eq!(feed.events.len(), 2);
    assert_eq!(feed.events[0].user_id, 77);
    assert_eq!(feed.events[1].user_id, 0);
    Ok(())
}

#[rstest]
fn test_trade_rows_map_to_events() -> Result<()> {
    let csv = trade_csv(&[(2_000, 1, 11, 12, 10_050, 5)]);
    let feed = read_events(csv.as_bytes(), FeedKind::Trades)?;

    assert_eq!(feed.events.len(), 1);
    let trade = feed.events[0];
    assert!(trade.is_trade());
    assert_eq!(trade.timestamp, Ts::from_nanos(2_000_001));
    assert_eq!((trade.buy_order_id, trade.sell_order_id), (11, 12));
    assert_eq!(trade.price, px(10_050));
    assert_eq!(trade.quantity, qty(5));
    Ok(())
}

#[rstest]
#[case::too_few_fields("0,1,2,3\n")]
#[case::bad_price("0,10,a,b,c,N,0,1,26000,B,abc,3\n")]
#[case::bad_order_id("0,10,a,b,c,N,0,-1,26000,B,100,3\n")]
#[case::unknown_type("0,10,a,b,c,Z,0,1,26000,B,100,3\n")]
#[case::empty_type("0,10,a,b,c,,0,1,26000,B,100,3\n")]
#[case::unknown_side("0,10,a,b,c,N,0,1,26000,Q,100,3\n")]
#[case::bad_timestamp("0,ten,a,b,c,N,0,1,26000,B,100,3\n")]
fn test_malformed_rows_are_skipped(#[case] bad_row: &str) -> Result<()> {
    let csv = format!(
        "{}{}{}",
        order_csv(&[(1, 0, "N", 1, "B", 100, 1)]),
        bad_row,
        "2,20,a,b,c,N,0,2,26000,S,101,1\n"
    );
    let feed = read_events(csv.as_bytes(), FeedKind::Orders)?;

    assert_eq!(feed.skipped, 1, "row {bad_row:?} should be skipped");
    let ids: Vec<u64> = feed.events.iter().map(|e| e.order_id).collect();
    assert_eq!(ids, vec![1, 2]);
    Ok(())
}

#[rstest]
fn test_merge_is_stable_by_timestamp() -> Result<()> {
    let orders = read_events(
        order_csv(&[
            (10, 0, "N", 1, "B", 100, 1),
            (30, 0, "N", 2, "B", 100, 1),
            (20, 0, "N", 3, "B", 100, 1),
        ])
        .as_bytes(),
        FeedKind::Orders,
    )?;
    let trades = read_events(
        trade_csv(&[(20, 0, 3, 9, 100, 1), (5, 0, 1, 9, 100, 1)]).as_bytes(),
        FeedKind::Trades,
    )?;

    let merged = merge(orders, trades);
    let sequence: Vec<(u64, bool)> = merged
        .events
        .iter()
        .map(|e| (e.timestamp.as_micros(), e.is_trade()))
        .collect();
    assert_eq!(
        sequence,
        vec![(5, true), (10, false), (20, false), (20, true), (30, false)]
    );
    Ok(())
}

#[rstest]
fn test_load_events_from_files() -> Result<()> {
    let orders = write_temp(&order_csv(&[
        (100, 0, "N", 1, "S", 101, 5),
        (300, 0, "X", 1, "S", 101, 5),
    ]))?;
    let trades = write_temp(&trade_csv(&[(200, 0, 2, 1, 101, 2)]))?;

    let feed = load_events(orders.path(), trades.path())?;
    assert_eq!(feed.len(), 3);
    assert_eq!(feed.skipped, 0);
    assert_eq!(feed.events[1].kind, EventKind::Trade);
    Ok(())
}

#[rstest]
fn test_missing_file_is_an_error() -> Result<()> {
    let trades = write_temp(&trade_csv(&[]))?;
    let missing = trades.path().with_extension("does-not-exist");

    let result = load_events(&missing, trades.path());
    assert!(matches!(result, Err(FeedError::Io { .. })));
    Ok(())
}

#[rstest]
fn test_header_only_file_is_empty() -> Result<()> {
    let feed = read_events(order_csv(&[]).as_bytes(), FeedKind::Orders)?;
    assert!(feed.is_empty());
    assert_eq!(feed.skipped, 0);
    Ok(())
}
