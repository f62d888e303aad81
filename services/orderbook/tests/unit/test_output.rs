//! Unit tests for the metrics CSV writer

use anyhow::Result;
use common::Ts;
use lob_replay::output::{MetricsWriter, render_depth};
use lob_replay::{EventBuilder, MetricsCalculator, OrderBook, Side};
use rstest::*;

fn lines(bytes: Vec<u8>) -> Result<Vec<String>> {
    Ok(String::from_utf8(bytes)?.lines().map(str::to_string).collect())
}

#[rstest]
fn test_header_and_row_layout() -> Result<()> {
    let mut book = OrderBook::new();
    let mut ev = EventBuilder::starting_at(Ts::from_nanos(1_600_000_000_000_000_000));
    book.apply(&ev.new_order(1, Side::Buy, 100, 10, 0));
    book.apply(&ev.new_order(2, Side::Sell, 102, 30, 0));
    let metrics = MetricsCalculator::calculate(&book, ev.now(), 2, 0.5);

    let mut writer = MetricsWriter::from_writer(Vec::new(), 2)?;
    writer.write(&metrics)?;
    assert_eq!(writer.rows(), 1);
    let out = lines(writer.into_inner()?)?;

    assert_eq!(
        out[0],
        "Timestamp,TimestampRaw,MidPrice,Spread,OFI_Top,OFI_Depth,BidLvl1,AskLvl1,BidLvl2,AskLvl2"
    );
    assert_eq!(
        out[1],
        "17:56:40.000000,1600000000000000002,101,2,-0.500000,-13.333333,10,30,0,0"
    );
    Ok(())
}

#[rstest]
fn test_rows_pad_short_depth() -> Result<()> {
    let book = OrderBook::new();
    let metrics = MetricsCalculator::calculate(&book, Ts::from_nanos(0), 1, 0.5);

    // Writer configured wider than the metrics it receives
    let mut writer = MetricsWriter::from_writer(Vec::new(), 3)?;
    writer.write(&metrics)?;
    let out = lines(writer.into_inner()?)?;

    let fields: Vec<&str> = out[1].split(',').collect();
    assert_eq!(fields.len(), 6 + 2 * 3);
    assert!(fields[6..].iter().all(|f| *f == "0"));
    Ok(())
}

#[rstest]
fn test_create_makes_parent_dirs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("metrics.csv");

    let mut writer = MetricsWriter::create(&path, 5)?;
    writer.flush()?;
    drop(writer);

    let contents = std::fs::read_to_string(&path)?;
    assert!(contents.starts_with("Timestamp,TimestampRaw"));
    assert!(contents.trim_end().ends_with("AskLvl5"));
    Ok(())
}

#[rstest]
fn test_depth_ladder_in_major_units() {
    let mut book = OrderBook::new();
    let mut ev = EventBuilder::new();
    book.apply(&ev.new_order(1, Side::Buy, 2_501_050, 75, 0));
    book.apply(&ev.new_order(2, Side::Sell, 2_501_100, 50, 0));

    let text = render_depth(&book.depth(Side::Buy, 3), &book.depth(Side::Sell, 3), 3);
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 4);
    assert!(rows[0].contains("BID PX"));
    assert!(rows[1].contains("25010.50"));
    assert!(rows[1].contains("25011.00"));
    assert!(rows[1].contains("75"));
    assert!(rows[3].contains('-'));
}
