use dotenvy::dotenv;
use eyre::{Result, WrapErr, eyre};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CMC_BASE_URL: &str = "https://pro-api.coinmarketcap.com";
const DEFAULT_DATABASE_URL: &str = "sqlite://portfolio.db";
const DEFAULT_PORTFOLIO_CONFIG_PATH: &str = "config.json";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_BACKOFF_SECS: u64 = 300;

/// Process-wide settings, built once at startup and passed down by reference
#[derive(Debug, Clone)]
pub struct Config {
    pub cmc_api_key: Option<String>,
    pub cmc_base_url: String,
    pub database_url: String,
    pub portfolio_config_path: PathBuf,
    pub poll_interval: Duration,
    pub backoff: Duration,
}

impl Config {
    /// Reads `.env` (if present) and the process environment
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, used by `load` and tests
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cmc_api_key = lookup("CMC_API_KEY").filter(|k| !k.trim().is_empty());
        let cmc_base_url = lookup("CMC_BASE_URL").unwrap_or_else(|| DEFAULT_CMC_BASE_URL.to_string());
        url::Url::parse(&cmc_base_url).wrap_err_with(|| format!("Invalid CMC_BASE_URL: {}", cmc_base_url))?;

        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let portfolio_config_path = lookup("PORTFOLIO_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PORTFOLIO_CONFIG_PATH));

        let poll_interval = parse_secs(&lookup, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let backoff = parse_secs(&lookup, "BACKOFF_SECS", DEFAULT_BACKOFF_SECS)?;

        Ok(Config {
            cmc_api_key,
            cmc_base_url,
            database_url,
            portfolio_config_path,
            poll_interval,
            backoff,
        })
    }

    /// The tracker cannot poll without a credential; the utility binaries can
    pub fn require_api_key(&self) -> Result<&str> {
        self.cmc_api_key
            .as_deref()
            .ok_or_else(|| eyre!("Missing CMC_API_KEY"))
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .wrap_err_with(|| format!("Invalid {}: {}", key, raw))?,
        None => default,
    };
    if secs == 0 {
        return Err(eyre!("{} must be greater than zero", key));
    }
    Ok(Duration::from_secs(secs))
}
