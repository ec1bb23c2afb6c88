use eyre::{Result, WrapErr};
use tracing::info;

use crypto_portfolio_tracker::config;
use crypto_portfolio_tracker::logging;
use crypto_portfolio_tracker::db::HistoryStore;
use crypto_portfolio_tracker::portfolio_spec::JsonPortfolioFile;
use crypto_portfolio_tracker::presentation::ConsolePresenter;
use crypto_portfolio_tracker::price_feed::CoinMarketCapClient;
use crypto_portfolio_tracker::scheduler::{CycleScheduler, SchedulerTiming};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (including .env) before logging so log levels can come from it
    let cfg = config::Config::load()?;

    // Initialize logging
    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }
    info!(
        database_url = %cfg.database_url,
        portfolio_config = %cfg.portfolio_config_path.display(),
        "Configuration loaded and logging initialized"
    );

    // Opening the history store is the only fatal step; everything after it retries
    let store = HistoryStore::init(&cfg.database_url)
        .await
        .wrap_err_with(|| format!("Failed to open history database at {}", cfg.database_url))?;
    info!("History store initialized");

    let feed = CoinMarketCapClient::new(&cfg.cmc_base_url, cfg.require_api_key()?)
        .wrap_err("Failed to build CoinMarketCap client")?;
    let portfolio = JsonPortfolioFile::new(cfg.portfolio_config_path.clone());

    let mut scheduler = CycleScheduler::new(
        SchedulerTiming::from_config(&cfg),
        store.clone(),
        feed,
        portfolio,
        ConsolePresenter::new(),
    );
    scheduler.run().await;

    store.close().await;
    info!("History store closed, exiting");
    Ok(())
}
