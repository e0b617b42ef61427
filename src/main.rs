use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use fxbot::execution::{spawn_synthetic_feed, LifecycleController, RunStatus, SyntheticTickStream, TickOutcome};
use fxbot::gateway::PaperGateway;
use fxbot::persistence::{default_snapshot_path, save_snapshot};
use fxbot::{Error, StrategyConfig};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Moving-average crossover trader running against a paper broker
#[derive(Debug, Parser)]
#[command(name = "fxbot", version)]
struct Cli {
    /// TOML configuration file (FXBOT_* environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed of the synthetic price feed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Milliseconds between synthetic ticks
    #[arg(long, default_value_t = 1000)]
    tick_interval_ms: u64,

    /// Starting mid price of the synthetic feed
    #[arg(long, default_value_t = 1.10)]
    initial_price: f64,

    /// Write a JSON snapshot of the run to this file when it ends
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Write a snapshot under snapshots/ with a generated name
    #[arg(long, conflicts_with = "snapshot")]
    save_snapshot: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    let config = StrategyConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let offset = config.utc_offset()?;

    tracing::info!(
        instrument = %config.instrument,
        signal = config.signal.name(),
        granularity_secs = config.granularity_secs,
        trade_size = config.trade_size,
        long_short = config.long_short,
        max_ticks = ?config.stop.max_ticks,
        timeout_secs = ?config.stop.timeout_secs,
        "fxbot starting"
    );

    let mut controller = LifecycleController::new(config, PaperGateway::new())?;

    let (tx, mut rx) = mpsc::channel(256);
    let stream = SyntheticTickStream::new(cli.seed, Utc::now(), cli.initial_price);
    let feed = spawn_synthetic_feed(
        stream,
        std::time::Duration::from_millis(cli.tick_interval_ms),
        tx,
    );

    let mut failure: Option<Error> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted; closing out");
                break;
            }
            tick = rx.recv() => {
                let Some(tick) = tick else {
                    tracing::warn!("Tick feed ended");
                    break;
                };

                match controller.on_tick(tick) {
                    Ok(TickOutcome::Stopped(_)) => break,
                    Ok(TickOutcome::Evaluated { signal, trade }) => {
                        let local = tick.timestamp.with_timezone(&offset);
                        tracing::info!(
                            time = %local.format("%Y-%m-%d %H:%M:%S %:z"),
                            bars = controller.bars().len(),
                            ?signal,
                            state = %controller.state(),
                            traded = trade.is_some(),
                            "Bar closed"
                        );
                    }
                    Ok(_) => {}
                    Err(e @ Error::NonMonotonicTick { .. }) => {
                        tracing::warn!(error = %e, "Dropping out-of-order tick");
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }
    }

    // Dropping the receiver ends the feed task
    drop(rx);
    feed.await.context("synthetic feed task panicked")?;

    // A failed close-out is cached and never resubmitted
    match controller.close_out() {
        Ok(report) => tracing::info!(
            status = ?controller.status(),
            ticks = controller.ticks_processed(),
            bars = controller.bars().len(),
            trades = controller.trades().len(),
            closed_units = report.queried_units,
            residual_units = report.residual_units,
            "Run finished"
        ),
        Err(e) => {
            tracing::error!(error = %e, "Run finished without a close-out");
            failure.get_or_insert(e);
        }
    }

    for trade in controller.trades() {
        println!(
            "{}  {:?} {:>8} {} @ {:.5}  pl={}{}",
            trade.timestamp.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S"),
            trade.side,
            trade.size,
            trade.instrument,
            trade.fill_price,
            trade
                .realized_pl
                .map(|pl| format!("{:.2}", pl))
                .unwrap_or_else(|| "-".to_string()),
            if trade.partial { "  (partial fill)" } else { "" }
        );
    }

    let snapshot_path = match (cli.snapshot, cli.save_snapshot) {
        (Some(path), _) => Some(path),
        (None, true) => Some(default_snapshot_path(&controller.config().instrument, Utc::now())),
        (None, false) => None,
    };
    if let Some(path) = snapshot_path {
        save_snapshot(&controller.snapshot(), &path)?;
    }

    if let Some(e) = failure {
        return Err(e).context("run halted");
    }
    if controller.status() == RunStatus::Halted {
        anyhow::bail!("run halted");
    }

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fxbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
