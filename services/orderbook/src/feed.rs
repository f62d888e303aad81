//! Exchange event file adapter
//!
//! Reads the order and trade CSV dumps into [`Event`]s. Both files share a
//! fixed column layout of at least 12 fields with a header row:
//!
//! | column | order file            | trade file     |
//! |--------|-----------------------|----------------|
//! | 1      | microseconds          | microseconds   |
//! | 5      | type code N/M/X/T     | -              |
//! | 6      | nanosecond remainder  | nanosecond rem |
//! | 7      | order id              | buy order id   |
//! | 8      | instrument token      | sell order id  |
//! | 9      | side B/S              | token          |
//! | 10     | price                 | price          |
//! | 11     | quantity              | quantity       |
//! | 12     | user id (optional)    | -              |
//!
//! Bad rows are skipped and counted; only I/O failures abort a load.

use common::{Px, Qty, Ts};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::FeedError;
use crate::events::{Event, EventKind, Side};

/// Minimum number of fields in a data row
pub const MIN_FIELDS: usize = 12;

/// Rows logged individually before only the total is reported
const MAX_LOGGED_ERRORS: u64 = 10;

const COL_MICROS: usize = 1;
const COL_ORDER_TYPE: usize = 5;
const COL_NANOS: usize = 6;
const COL_ORDER_ID: usize = 7;
const COL_BUY_ORDER_ID: usize = 7;
const COL_SELL_ORDER_ID: usize = 8;
const COL_SIDE: usize = 9;
const COL_PRICE: usize = 10;
const COL_QUANTITY: usize = 11;
const COL_USER_ID: usize = 12;

/// Which dump a file is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Order lifecycle messages
    Orders,
    /// Trade prints
    Trades,
}

/// Events read from one or more files
#[derive(Debug, Clone, Default)]
pub struct EventFeed {
    /// Parsed events
    pub events: Vec<Event>,
    /// Rows skipped as malformed
    pub skipped: u64,
}

impl EventFeed {
    /// Number of parsed events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing parsed
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Parse one order-file row
pub fn parse_order_record(record: &StringRecord, line: u64) -> Result<Event, FeedError> {
    check_width(record, line)?;
    let timestamp = parse_timestamp(record, line)?;

    let code = field(record, COL_ORDER_TYPE);
    let kind = code
        .chars()
        .next()
        .and_then(EventKind::from_code)
        .ok_or_else(|| FeedError::UnknownOrderType {
            line,
            code: code.to_string(),
        })?;

    let side_code = field(record, COL_SIDE);
    let side = Side::from_code(side_code).ok_or_else(|| FeedError::UnknownSide {
        line,
        code: side_code.to_string(),
    })?;

    let order_id: u64 = parse_field(record, COL_ORDER_ID, "order_id", line)?;
    let price = Px::from_i64(parse_field(record, COL_PRICE, "price", line)?);
    let quantity = Qty::from_i64(parse_field(record, COL_QUANTITY, "quantity", line)?);
    let user_id = match record.get(COL_USER_ID).map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_field(record, COL_USER_ID, "user_id", line)?,
        _ => 0,
    };

    Ok(Event {
        timestamp,
        kind,
        order_id,
        price,
        quantity,
        side,
        user_id,
        buy_order_id: 0,
        sell_order_id: 0,
    })
}

/// Parse one trade-file row
pub fn parse_trade_record(record: &StringRecord, line: u64) -> Result<Event, FeedError> {
    check_width(record, line)?;
    let timestamp = parse_timestamp(record, line)?;

    Ok(Event::trade(
        timestamp,
        parse_field(record, COL_BUY_ORDER_ID, "buy_order_id", line)?,
        parse_field(record, COL_SELL_ORDER_ID, "sell_order_id", line)?,
        Px::from_i64(parse_field(record, COL_PRICE, "price", line)?),
        Qty::from_i64(parse_field(record, COL_QUANTITY, "quantity", line)?),
    ))
}

/// Read every row of one dump, skipping malformed ones
pub fn read_events<R: Read>(reader: R, kind: FeedKind) -> Result<EventFeed, FeedError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let parse = match kind {
        FeedKind::Orders => parse_order_record,
        FeedKind::Trades => parse_trade_record,
    };

    let mut feed = EventFeed::default();
    for result in reader.records() {
        let outcome = match result {
            Ok(record) => {
                let line = record.position().map_or(0, |p| p.line());
                parse(&record, line)
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(event) => feed.events.push(event),
            Err(e) => {
                feed.skipped += 1;
                if feed.skipped <= MAX_LOGGED_ERRORS {
                    warn!(?kind, "skipping row: {e}");
                }
            }
        }
    }

    if feed.skipped > 0 {
        warn!(?kind, skipped = feed.skipped, "malformed rows skipped");
    }
    Ok(feed)
}

/// Read one dump from disk
pub fn read_file(path: &Path, kind: FeedKind) -> Result<EventFeed, FeedError> {
    let file = File::open(path).map_err(|source| FeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let feed = read_events(file, kind)?;
    info!(path = %path.display(), events = feed.len(), skipped = feed.skipped, "loaded feed");
    Ok(feed)
}

/// Merge two feeds into one timeline
///
/// The sort is stable: equal timestamps keep order events ahead of trades
/// and each file's own row order.
pub fn merge(orders: EventFeed, trades: EventFeed) -> EventFeed {
    let mut events = orders.events;
    events.extend(trades.events);
    events.sort_by_key(|event| event.timestamp);
    EventFeed {
        events,
        skipped: orders.skipped + trades.skipped,
    }
}

/// Load and merge the order and trade dumps
pub fn load_events(orders: &Path, trades: &Path) -> Result<EventFeed, FeedError> {
    let orders = read_file(orders, FeedKind::Orders)?;
    let trades = read_file(trades, FeedKind::Trades)?;
    Ok(merge(orders, trades))
}

fn check_width(record: &StringRecord, line: u64) -> Result<(), FeedError> {
    if record.len() < MIN_FIELDS {
        return Err(FeedError::TooFewFields {
            line,
            expected: MIN_FIELDS,
            found: record.len(),
        });
    }
    Ok(())
}

fn field(record: &StringRecord, index: usize) -> &str {
    record.get(index).map_or("", str::trim)
}

fn parse_field<T: std::str::FromStr>(
    record: &StringRecord,
    index: usize,
    name: &'static str,
    line: u64,
) -> Result<T, FeedError> {
    let raw = field(record, index);
    raw.parse().map_err(|_| FeedError::InvalidField {
        line,
        field: name,
        value: raw.to_string(),
    })
}

/// `micros * 1000 + nanos`, rejecting overflow
fn parse_timestamp(record: &StringRecord, line: u64) -> Result<Ts, FeedError> {
    let micros: u64 = parse_field(record, COL_MICROS, "timestamp", line)?;
    let nanos: u64 = parse_field(record, COL_NANOS, "timestamp_nanos", line)?;
    micros
        .checked_mul(1000)
        .and_then(|ns| ns.checked_add(nanos))
        .map(Ts::from_nanos)
        .ok_or_else(|| FeedError::InvalidField {
            line,
            field: "timestamp",
            value: format!("{micros}+{nanos}"),
        })
}
