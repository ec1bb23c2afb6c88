use eyre::{Result, WrapErr, eyre};
use std::env;
use tracing::info;

use crypto_portfolio_tracker::config;
use crypto_portfolio_tracker::logging;
use crypto_portfolio_tracker::db::HistoryStore;
use crypto_portfolio_tracker::presentation::local_time;

const DEFAULT_LIMIT: i64 = 10;

// Usage: show_history [limit] [symbol]
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::Config::load()?;

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let mut args = env::args().skip(1);
    let limit = match args.next() {
        Some(raw) => raw.parse::<i64>().wrap_err_with(|| format!("Invalid limit: {}", raw))?,
        None => DEFAULT_LIMIT,
    };
    if limit <= 0 {
        return Err(eyre!("Limit must be positive"));
    }
    let symbol = args.next();

    let store = HistoryStore::open_existing(&cfg.database_url)
        .await
        .wrap_err_with(|| format!("No readable history database at {}", cfg.database_url))?;
    let (observation_rows, snapshot_rows) = store.row_counts().await?;
    info!(observation_rows, snapshot_rows, "History loaded");

    println!("Last {} portfolio snapshots (newest first):", limit);
    for snapshot in store.recent_snapshots(limit).await? {
        println!(
            "  {} | TOTAL: {:.2} {} | Change: {}",
            local_time(snapshot.timestamp),
            snapshot.total_value.round_dp(2),
            snapshot.currency,
            snapshot.total_change,
        );
    }

    if let Some(symbol) = symbol {
        println!("\nLast {} observations for {}:", limit, symbol);
        for obs in store.recent_observations(&symbol, limit).await? {
            println!(
                "  {} | Amount: {} | Price: {:.4} | Value: {:.2} | Change: {}",
                local_time(obs.timestamp),
                obs.amount.normalize(),
                obs.price.round_dp(4),
                obs.value.round_dp(2),
                obs.price_change,
            );
        }
    }

    store.close().await;
    Ok(())
}
