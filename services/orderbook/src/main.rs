//! Order book replay service
//!
//! Rebuilds the limit order book from exchange order/trade dumps and writes
//! per-event microstructure metrics to CSV.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lob_replay::{
    config::ServiceConfig,
    events::{Event, Side},
    feed,
    output::{MetricsWriter, render_depth},
    replay::ReplayEngine,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Order book replay CLI
#[derive(Parser)]
#[clap(name = "lob-replay")]
#[clap(about = "Limit order book reconstruction and microstructure metrics")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[clap(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the event dumps and write metrics
    Replay {
        /// Order dump
        #[clap(long)]
        orders: Option<PathBuf>,

        /// Trade dump
        #[clap(long)]
        trades: Option<PathBuf>,

        /// Metrics CSV destination
        #[clap(long)]
        output: Option<PathBuf>,

        /// Levels per side in each metrics row
        #[clap(long)]
        depth_levels: Option<usize>,

        /// Depth OFI decay factor
        #[clap(long)]
        decay_lambda: Option<f64>,

        /// Events between snapshots
        #[clap(long)]
        snapshot_interval: Option<u64>,

        /// Events between console depth prints (0 disables)
        #[clap(long)]
        print_interval: Option<u64>,
    },

    /// Load and validate the event dumps without replaying
    Check {
        /// Order dump
        #[clap(long)]
        orders: Option<PathBuf>,

        /// Trade dump
        #[clap(long)]
        trades: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.debug {
        "lob_replay=debug"
    } else {
        "lob_replay=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let mut config = ServiceConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay {
            orders,
            trades,
            output,
            depth_levels,
            decay_lambda,
            snapshot_interval,
            print_interval,
        } => {
            if let Some(path) = orders {
                config.input.orders_path = path;
            }
            if let Some(path) = trades {
                config.input.trades_path = path;
            }
            if let Some(path) = output {
                config.output.metrics_path = path;
            }
            if let Some(levels) = depth_levels {
                config.replay.depth_levels = levels;
            }
            if let Some(lambda) = decay_lambda {
                config.replay.decay_lambda = lambda;
            }
            if let Some(interval) = snapshot_interval {
                config.replay.snapshot_interval = interval;
            }
            if let Some(interval) = print_interval {
                config.output.print_interval = interval;
            }
            config.validate()?;
            run_replay(&config)
        }
        Commands::Check { orders, trades } => {
            if let Some(path) = orders {
                config.input.orders_path = path;
            }
            if let Some(path) = trades {
                config.input.trades_path = path;
            }
            run_check(&config)
        }
    }
}

fn run_replay(config: &ServiceConfig) -> Result<()> {
    let started = Instant::now();
    let feed = feed::load_events(&config.input.orders_path, &config.input.trades_path)
        .context("failed to load event files")?;
    info!(events = feed.len(), skipped = feed.skipped, "events loaded");

    let mut writer = MetricsWriter::create(&config.output.metrics_path, config.replay.depth_levels)?;
    let mut engine = ReplayEngine::new(config.replay.clone());
    let print_interval = config.output.print_interval;

    for (index, event) in feed.events.iter().enumerate() {
        let metrics = engine.step(event);
        writer.write(&metrics)?;

        if print_interval > 0 && index as u64 % print_interval == 0 {
            let book = engine.book();
            println!(
                "\n[{}] event {} | mid {:.2} | spread {} | OFI {:.4}",
                metrics.formatted_timestamp,
                index,
                metrics.mid_price / 100.0,
                metrics.spread,
                metrics.ofi_top
            );
            print!(
                "{}",
                render_depth(
                    &book.depth(Side::Buy, config.output.print_depth),
                    &book.depth(Side::Sell, config.output.print_depth),
                    config.output.print_depth,
                )
            );
        }
    }
    writer.flush()?;
    engine.log_summary();

    if let Err(e) = engine.book().verify_integrity() {
        error!("book integrity check failed: {e}");
    }

    info!(
        rows = writer.rows(),
        output = %config.output.metrics_path.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "metrics written"
    );
    Ok(())
}

fn run_check(config: &ServiceConfig) -> Result<()> {
    let orders = feed::read_file(&config.input.orders_path, feed::FeedKind::Orders)?;
    let trades = feed::read_file(&config.input.trades_path, feed::FeedKind::Trades)?;

    println!(
        "order events:  {} ({} rows out of time order)",
        orders.len(),
        regressions(&orders.events)
    );
    println!(
        "trade events:  {} ({} rows out of time order)",
        trades.len(),
        regressions(&trades.events)
    );

    let merged = feed::merge(orders, trades);
    println!("skipped rows:  {}", merged.skipped);
    if let (Some(first), Some(last)) = (merged.events.first(), merged.events.last()) {
        println!(
            "time range:    {} .. {}",
            first.timestamp.format_ist(),
            last.timestamp.format_ist()
        );
    }
    Ok(())
}

/// Rows stamped earlier than the row before them
fn regressions(events: &[Event]) -> usize {
    events
        .windows(2)
        .filter(|pair| pair[1].timestamp < pair[0].timestamp)
        .count()
}
