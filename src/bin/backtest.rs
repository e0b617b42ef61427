use chrono::Duration;
use clap::Parser;
use fxbot::backtest::{
    format_ratio, BacktestResult, BacktestRunner, InMemoryHistory, MarketScenario,
    SyntheticDataGenerator,
};
use fxbot::settings::SignalMethod;
use fxbot::StrategyConfig;
use std::path::PathBuf;

/// Compare every signal method over synthetic market scenarios
#[derive(Debug, Parser)]
#[command(name = "backtest", version)]
struct Cli {
    /// TOML configuration file supplying instrument, trade size and annualisation
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the synthetic bar series
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of daily bars per scenario
    #[arg(long, default_value_t = 500)]
    bars: usize,

    /// Print the full report for every run
    #[arg(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("fxbot=warn")
        .init();

    let cli = Cli::parse();
    let base = StrategyConfig::load(cli.config.as_deref())?;

    let methods = [
        SignalMethod::Sma {
            short_window: 20,
            long_window: 50,
        },
        SignalMethod::Ema {
            short_halflife: 10.0,
            long_halflife: 30.0,
            warmup_bars: None,
        },
        SignalMethod::EmaSma {
            ema_halflife: 10.0,
            sma_window: 50,
        },
    ];

    println!("\n=== MOVING AVERAGE BACKTEST: {} ===", base.instrument);

    let granularity = Duration::days(1);
    let mut results: Vec<(MarketScenario, BacktestResult)> = Vec::new();

    for scenario in MarketScenario::ALL {
        let bars = SyntheticDataGenerator::new(cli.seed).generate(scenario, cli.bars, granularity);
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            continue;
        };
        let history = InMemoryHistory::new(base.instrument.clone(), granularity, bars.clone())?;

        for method in &methods {
            let config = StrategyConfig {
                signal: method.clone(),
                granularity_secs: granularity.num_seconds() as u64,
                ..base.clone()
            };

            let runner = BacktestRunner::new(config)?;
            match runner.run_from_source(&history, first.start_time, last.start_time) {
                Ok(result) => {
                    if cli.verbose {
                        result
                            .statistics
                            .print_report(&format!("{:?} / {}", scenario, method.name()));
                    }
                    results.push((scenario, result));
                }
                Err(e) => eprintln!("Backtest failed for {:?} / {}: {}", scenario, method.name(), e),
            }
        }
    }

    print_summary_comparison(&results);

    Ok(())
}

fn print_summary_comparison(results: &[(MarketScenario, BacktestResult)]) {
    println!("\n=== SCENARIO COMPARISON ===\n");
    println!(
        "{:<12} {:<16} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "Scenario", "Engine", "Return%", "AnnRet%", "AnnVol%", "Sharpe", "Trades"
    );
    println!("{}", "-".repeat(82));

    for (scenario, result) in results {
        let stats = &result.statistics;
        println!(
            "{:<12} {:<16} {:>10.2} {:>10} {:>10} {:>10} {:>8}",
            format!("{:?}", scenario),
            result.engine,
            stats.total_return * 100.0,
            format_ratio(stats.annualized_return.map(|r| r * 100.0), ""),
            format_ratio(stats.annualized_volatility.map(|v| v * 100.0), ""),
            format_ratio(stats.sharpe_ratio, ""),
            stats.num_trades
        );
    }

    if let Some((scenario, best)) = results
        .iter()
        .max_by(|a, b| a.1.statistics.total_return.total_cmp(&b.1.statistics.total_return))
    {
        println!(
            "\nBest: {} on {:?} ({:+.2}%)",
            best.engine,
            scenario,
            best.statistics.total_return * 100.0
        );
    }

    let total_trades: usize = results.iter().map(|(_, r)| r.statistics.num_trades).sum();
    println!("Total trades across all runs: {}\n", total_trades);
}
