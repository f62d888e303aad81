//! Metrics CSV writer and console depth ladder

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::analytics::BookMetrics;
use crate::error::OutputError;
use crate::replay::MetricsSink;
use crate::snapshot::DepthLevel;

/// Fixed leading columns of the metrics file
pub const METRICS_COLUMNS: [&str; 6] = [
    "Timestamp",
    "TimestampRaw",
    "MidPrice",
    "Spread",
    "OFI_Top",
    "OFI_Depth",
];

/// Header row for `depth_levels` bid/ask column pairs
pub fn metrics_header(depth_levels: usize) -> Vec<String> {
    let mut header: Vec<String> = METRICS_COLUMNS.iter().map(|c| c.to_string()).collect();
    for level in 1..=depth_levels {
        header.push(format!("BidLvl{level}"));
        header.push(format!("AskLvl{level}"));
    }
    header
}

/// Streams one CSV row per [`BookMetrics`]
pub struct MetricsWriter<W: Write> {
    writer: csv::Writer<W>,
    depth_levels: usize,
    rows: u64,
}

impl MetricsWriter<File> {
    /// Create (truncate) `path`, creating missing parent directories
    pub fn create(path: &Path, depth_levels: usize) -> Result<Self, OutputError> {
        let create_err = |source| OutputError::Create {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(create_err)?;
        }
        let file = File::create(path).map_err(create_err)?;
        Self::from_writer(file, depth_levels)
    }
}

impl<W: Write> MetricsWriter<W> {
    /// Wrap a writer and emit the header row
    pub fn from_writer(inner: W, depth_levels: usize) -> Result<Self, OutputError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(metrics_header(depth_levels))?;
        Ok(Self {
            writer,
            depth_levels,
            rows: 0,
        })
    }

    /// Append one metrics row
    pub fn write(&mut self, metrics: &BookMetrics) -> Result<(), OutputError> {
        let mut row = Vec::with_capacity(METRICS_COLUMNS.len() + 2 * self.depth_levels);
        row.push(metrics.formatted_timestamp.clone());
        row.push(metrics.timestamp_raw.as_nanos().to_string());
        row.push(metrics.mid_price.to_string());
        row.push(metrics.spread.to_string());
        row.push(format!("{:.6}", metrics.ofi_top));
        row.push(format!("{:.6}", metrics.ofi_depth));
        for level in 0..self.depth_levels {
            let bid = metrics.depth_bids.get(level).map_or(0, |q| q.as_i64());
            let ask = metrics.depth_asks.get(level).map_or(0, |q| q.as_i64());
            row.push(bid.to_string());
            row.push(ask.to_string());
        }
        self.writer.write_record(&row)?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, header excluded
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush buffered rows
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W, OutputError> {
        self.writer
            .into_inner()
            .map_err(|e| OutputError::Io(e.into_error()))
    }
}

impl<W: Write> MetricsSink for MetricsWriter<W> {
    fn record(&mut self, metrics: &BookMetrics) -> Result<(), OutputError> {
        self.write(metrics)
    }
}

/// Side-by-side ladder of the top `rows` levels, prices in major units
pub fn render_depth(bids: &[DepthLevel], asks: &[DepthLevel], rows: usize) -> String {
    let header = format!("{:>12} {:>10} | {:>12} {:>10}\n", "BID PX", "BID QTY", "ASK PX", "ASK QTY");
    (0..rows).fold(header, |mut out, i| {
        let (bid_px, bid_qty) = cell(bids.get(i));
        let (ask_px, ask_qty) = cell(asks.get(i));
        out.push_str(&format!("{bid_px:>12} {bid_qty:>10} | {ask_px:>12} {ask_qty:>10}\n"));
        out
    })
}

fn cell(level: Option<&DepthLevel>) -> (String, String) {
    match level {
        Some((price, qty)) => (
            format!("{:.2}", price.as_f64() / 100.0),
            qty.as_i64().to_string(),
        ),
        None => ("-".to_string(), "-".to_string()),
    }
}
