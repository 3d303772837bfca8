use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stockalloc::app::{Notice, Session, SessionBuilder};
use stockalloc::config::{default_config_path, ResolvedConfig};
use stockalloc::duration::format_duration;
use stockalloc::format::{format_percent, format_quantity, MoneyFormat};
use stockalloc::portfolio::PortfolioSnapshot;
use stockalloc::refresh::RefreshReport;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_interval_arg(s: &str) -> Result<Duration, String> {
    stockalloc::duration::parse_interval(s).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "stockalloc")]
#[command(about = "Track holdings against target allocations and see how to rebalance")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Show fractional rebalance actions instead of whole shares
    #[arg(long)]
    exact: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show holdings, allocations and rebalance actions
    Show,
    /// Add a holding at its current market price
    Add { ticker: String, quantity: f64 },
    /// Remove a holding
    Remove { ticker: String },
    /// Change the number of shares held
    SetQuantity { ticker: String, quantity: f64 },
    /// Change the target allocation percentage
    SetTarget { ticker: String, percent: f64 },
    /// Fetch current prices for every holding
    Refresh,
    /// Write the portfolio to a timestamped CSV file
    Export,
    /// Refresh on a timer and reprint the table until Ctrl-C
    Watch {
        /// Refresh interval (e.g. "30s", "5m")
        #[arg(long, value_parser = parse_interval_arg)]
        interval: Option<Duration>,
    },
    /// Show current configuration
    Config,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

fn report_notice(notice: &Notice) {
    eprintln!("{notice}");
}

fn print_snapshot(snapshot: &PortfolioSnapshot, money: &MoneyFormat) {
    if snapshot.rows.is_empty() {
        println!("No holdings. Add one with 'stockalloc add TICKER QUANTITY'.");
        return;
    }

    println!(
        "{:<8} {:>12} {:>12} {:>8} {:>8} {:>14} {:>14} {:>14}  {}",
        "Ticker", "Price", "Quantity", "Target", "Current", "Value", "Target Value", "Difference",
        "Action"
    );
    for row in &snapshot.rows {
        println!(
            "{:<8} {:>12} {:>12} {:>8} {:>8} {:>14} {:>14} {:>14}  {}",
            row.ticker.as_str(),
            money.format(row.price),
            format_quantity(row.quantity),
            format_percent(row.target_allocation),
            format_percent(row.current_allocation),
            money.format(row.current_value),
            money.format(row.target_value),
            money.format(row.difference),
            row.action
        );
    }
    println!();
    println!("Total value: {}", money.format(snapshot.total_value));
}

async fn print_status(session: &Session, money: &MoneyFormat) {
    print_snapshot(&session.snapshot().await, money);
    println!("{}", session.allocation_message().await);
    if let Some(at) = session.last_refresh().await {
        println!(
            "Last refresh: {}",
            at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
        );
    }
}

fn print_report(session: &Session, report: &RefreshReport) {
    match session.refresh_notice(report) {
        Some(notice) => report_notice(&notice),
        None => info!(
            trigger = %report.trigger,
            updated = report.outcome.updated().len(),
            "prices refreshed"
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let mut config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    if cli.exact {
        config.session.share_rounding = false;
    }

    let money = MoneyFormat::new(
        config.display.currency_symbol.clone(),
        config.display.currency_grouping,
    );

    let command = match cli.command {
        Some(Command::Config) => {
            println!("Config file: {}", cli.config.display());
            println!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        Some(command) => command,
        None => Command::Show,
    };

    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();
    let mut builder = SessionBuilder::from_config(&config)?.with_reports(reports_tx);
    if let Command::Watch {
        interval: Some(interval),
    } = &command
    {
        builder = builder.with_refresh_interval(*interval);
    }

    // Watch drives the timer itself; other commands never start it.
    let mut settings = config.session;
    settings.auto_refresh = false;
    let (mut session, notice) = builder.with_settings(settings).open().await;
    if let Some(notice) = notice {
        report_notice(&notice);
    }

    let result = match command {
        Command::Show => {
            print_status(&session, &money).await;
            Ok(())
        }
        Command::Add { ticker, quantity } => session
            .add_holding(&ticker, quantity)
            .await
            .map(|holding| {
                println!(
                    "Added {} at {}",
                    holding.ticker(),
                    money.format(holding.current_price())
                )
            }),
        Command::Remove { ticker } => session
            .remove_holding(&ticker)
            .await
            .map(|holding| println!("Removed {}", holding.ticker())),
        Command::SetQuantity { ticker, quantity } => {
            session.update_quantity(&ticker, quantity).await
        }
        Command::SetTarget { ticker, percent } => {
            let result = session.update_target_allocation(&ticker, percent).await;
            println!("{}", session.allocation_message().await);
            result
        }
        Command::Refresh => {
            let report = session.refresh_now().await;
            print_report(&session, &report);
            print_status(&session, &money).await;
            Ok(())
        }
        Command::Export => session
            .export_csv()
            .await
            .map(|path| println!("Exported to {}", path.display())),
        Command::Watch { interval } => {
            let period = interval.unwrap_or(config.refresh.interval);
            println!("Refreshing every {} (Ctrl-C to stop)", format_duration(period));
            print_report(&session, &session.refresh_now().await);
            print_status(&session, &money).await;

            session.set_auto_refresh(true);
            loop {
                tokio::select! {
                    Some(report) = reports_rx.recv() => {
                        print_report(&session, &report);
                        print_status(&session, &money).await;
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            session.set_auto_refresh(false);
            Ok(())
        }
        Command::Config => Ok(()),
    };

    if let Err(notice) = &result {
        report_notice(notice);
    }
    if let Err(notice) = session.shutdown().await {
        report_notice(&notice);
    }

    result.map_err(anyhow::Error::from)
}
